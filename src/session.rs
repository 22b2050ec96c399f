//! Session credentials passed explicitly to the store clients.
//!
//! Token resolution order:
//! 1) CLI --token (explicit)
//! 2) GLAURA_TOKEN environment variable
//! 3) Persisted session file (written by `glaura login`)
//!
//! User resolution order:
//! 1) CLI --user
//! 2) GLAURA_USER environment variable
//! 3) User saved with the persisted session
//! 4) Config default (session.user)

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::lock::write_atomic;

const SESSION_FILENAME: &str = "session.json";

/// Bearer credential and acting user for one run.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    user: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

impl Session {
    pub fn new(token: impl Into<String>, user: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::Auth("bearer token cannot be empty".to_string()));
        }
        Ok(Self {
            token: token.to_string(),
            user: user.into(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Name recorded as `created_by` on new records.
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSession {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub saved_at: DateTime<Utc>,
}

/// Cached credentials on disk.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Session file in the platform data directory, when one exists.
    pub fn default_location() -> Option<Self> {
        directories::ProjectDirs::from("", "", "glaura")
            .map(|dirs| Self::new(dirs.data_dir().join(SESSION_FILENAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<PersistedSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let session: PersistedSession = serde_json::from_str(&raw)?;
        if session.token.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub fn save(&self, token: &str, user: Option<&str>) -> Result<()> {
        let token = non_empty(Some(token))
            .ok_or_else(|| Error::InvalidArgument("token cannot be empty".to_string()))?;
        let persisted = PersistedSession {
            token: token.to_string(),
            user: non_empty(user).map(str::to_string),
            saved_at: Utc::now(),
        };
        let data = serde_json::to_vec_pretty(&persisted)?;
        write_atomic(&self.path, &data)
    }

    /// Discard cached credentials. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(Error::Io(err)),
        }
    }
}

/// Resolve the session for this run.
pub fn resolve_session(
    cli_token: Option<&str>,
    cli_user: Option<&str>,
    file: Option<&SessionFile>,
    config: &Config,
) -> Result<Session> {
    let env_token = std::env::var("GLAURA_TOKEN").ok();
    let env_user = std::env::var("GLAURA_USER").ok();
    let persisted = match file {
        Some(file) => file.load()?,
        None => None,
    };

    let token = non_empty(cli_token)
        .or_else(|| non_empty(env_token.as_deref()))
        .or_else(|| persisted.as_ref().and_then(|p| non_empty(Some(p.token.as_str()))))
        .ok_or_else(|| {
            Error::Auth("no session token; run `glaura login --token <token>`".to_string())
        })?;

    let user = non_empty(cli_user)
        .or_else(|| non_empty(env_user.as_deref()))
        .or_else(|| persisted.as_ref().and_then(|p| non_empty(p.user.as_deref())))
        .unwrap_or(config.session.user.as_str());

    Session::new(token, user)
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_and_redacted_debug() {
        let session = Session::new("abc123", "ops").expect("session");
        assert_eq!(session.bearer(), "Bearer abc123");
        let debug = format!("{session:?}");
        assert!(!debug.contains("abc123"));
        assert!(debug.contains("ops"));
    }

    #[test]
    fn empty_token_is_auth_error() {
        assert!(Session::new("   ", "ops").unwrap_err().is_auth());
    }

    #[test]
    fn session_file_round_trip_and_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = SessionFile::new(dir.path().join("nested").join(SESSION_FILENAME));
        assert!(file.load().expect("load").is_none());

        file.save("tok-1", Some("harbor-master")).expect("save");
        let loaded = file.load().expect("load").expect("session");
        assert_eq!(loaded.token, "tok-1");
        assert_eq!(loaded.user.as_deref(), Some("harbor-master"));

        assert!(file.clear().expect("clear"));
        assert!(!file.clear().expect("clear again"));
        assert!(file.load().expect("load").is_none());
    }

    #[test]
    fn cli_values_take_precedence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = SessionFile::new(dir.path().join(SESSION_FILENAME));
        file.save("persisted", Some("saved-user")).expect("save");

        let session =
            resolve_session(Some("explicit"), Some("cli-user"), Some(&file), &Config::default())
                .expect("session");
        assert_eq!(session.token(), "explicit");
        assert_eq!(session.user(), "cli-user");
    }
}
