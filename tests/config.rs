use glaura::config::{Config, StatusConvention, CONFIG_FILENAME};
use glaura::error::Error;
use glaura::rollup::RollUpPolicy;

#[test]
fn saved_config_loads_back() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(CONFIG_FILENAME);

    let mut config = Config::default();
    config.api.base_url = "https://portcall.example.com/api".to_string();
    config.rollup.auto_reopen = false;
    config.conventions.header_status = StatusConvention::PendingIsTrue;
    config.save(&path)?;

    let loaded = Config::load(&path)?;
    assert_eq!(loaded.api.base_url, "https://portcall.example.com/api");
    assert_eq!(
        loaded.conventions.resolve().header,
        StatusConvention::PendingIsTrue
    );

    let policy = RollUpPolicy::from(&loaded.rollup);
    assert!(!policy.auto_reopen);
    assert!(policy.retry_transient_writes);
    Ok(())
}

#[test]
fn explicit_config_path_is_used() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ops.toml");
    std::fs::write(&path, "[session]\nuser = \"harbor-master\"\n")?;

    let config = Config::discover(Some(&path))?;
    assert_eq!(config.session.user, "harbor-master");
    assert_eq!(config.api.timeout_secs, 30);
    Ok(())
}

#[test]
fn non_http_base_url_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(CONFIG_FILENAME);
    std::fs::write(&path, "[api]\nbase_url = \"ftp://files.example.com\"\n")?;

    assert!(matches!(Config::load(&path), Err(Error::InvalidConfig(_))));
    Ok(())
}
