//! Pure completion rules for the Task → Header → Service hierarchy.

use serde::Serialize;

use crate::model::{StatusValue, Task, TaskHeader};

/// True iff the status is boolean `true` or the exact string `"true"`.
///
/// This is the only place status values are interpreted.
pub fn normalized_truthy(status: &StatusValue) -> bool {
    match status.raw() {
        serde_json::Value::Bool(flag) => *flag,
        serde_json::Value::String(text) => text == "true",
        _ => false,
    }
}

/// A header is complete when it has tasks and all of them are complete.
pub fn is_header_complete(tasks: &[Task]) -> bool {
    !tasks.is_empty() && tasks.iter().all(|task| normalized_truthy(&task.status))
}

/// A service is complete when it has headers and each header's hydrated
/// task list is complete. Headers without loaded tasks count as incomplete.
pub fn is_service_complete(headers: &[TaskHeader]) -> bool {
    !headers.is_empty()
        && headers.iter().all(|header| {
            header
                .tasks
                .as_deref()
                .map(is_header_complete)
                .unwrap_or(false)
        })
}

/// What the orchestrator should write to bring a parent in line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Stored status already matches.
    None,
    /// Mark the parent complete.
    Complete,
    /// Mark a previously complete parent incomplete again.
    Reopen,
    /// The parent should reopen but policy forbids automatic reopening.
    Suppressed,
}

impl Transition {
    /// Status to write, if any.
    pub fn write_value(self) -> Option<bool> {
        match self {
            Transition::Complete => Some(true),
            Transition::Reopen => Some(false),
            Transition::None | Transition::Suppressed => None,
        }
    }
}

pub fn plan_transition(current: bool, target: bool, auto_reopen: bool) -> Transition {
    match (current, target) {
        (false, true) => Transition::Complete,
        (true, false) if auto_reopen => Transition::Reopen,
        (true, false) => Transition::Suppressed,
        _ => Transition::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: impl Into<StatusValue>) -> Task {
        Task {
            id: "t".to_string(),
            header_id: "h".to_string(),
            task_name: "Immigration".to_string(),
            status: status.into(),
            created_by: None,
            compleated_date: None,
            compleated_time: None,
        }
    }

    fn header(tasks: Option<Vec<Task>>) -> TaskHeader {
        TaskHeader {
            id: "h".to_string(),
            job_id: "J1".to_string(),
            service_id: "S1".to_string(),
            header_name: "Clearance".to_string(),
            status: StatusValue::flag(false),
            created_by: None,
            compleated_date: None,
            compleated_time: None,
            tasks,
        }
    }

    #[test]
    fn truthiness_is_strict() {
        assert!(normalized_truthy(&StatusValue::flag(true)));
        assert!(normalized_truthy(&StatusValue::from("true")));
        assert!(!normalized_truthy(&StatusValue::flag(false)));
        assert!(!normalized_truthy(&StatusValue::from("false")));
        assert!(!normalized_truthy(&StatusValue::from("TRUE")));
        assert!(!normalized_truthy(&StatusValue::from("1")));
        assert!(!normalized_truthy(&StatusValue::missing()));
        assert!(!normalized_truthy(&StatusValue(serde_json::json!(1))));
    }

    #[test]
    fn empty_header_is_never_complete() {
        assert!(!is_header_complete(&[]));
    }

    #[test]
    fn header_requires_every_task() {
        assert!(is_header_complete(&[task(true), task("true")]));
        assert!(!is_header_complete(&[task(true), task(false)]));
        assert!(!is_header_complete(&[task("false")]));
    }

    #[test]
    fn header_completion_matches_all_truthy() {
        let statuses: [StatusValue; 4] = [
            StatusValue::flag(true),
            StatusValue::from("true"),
            StatusValue::flag(false),
            StatusValue::from("false"),
        ];
        for a in &statuses {
            for b in &statuses {
                let tasks = vec![task(a.clone()), task(b.clone())];
                let expected = normalized_truthy(a) && normalized_truthy(b);
                assert_eq!(is_header_complete(&tasks), expected);
            }
        }
    }

    #[test]
    fn service_requires_hydrated_complete_headers() {
        assert!(!is_service_complete(&[]));
        assert!(is_service_complete(&[
            header(Some(vec![task(true)])),
            header(Some(vec![task("true"), task(true)])),
        ]));
        assert!(!is_service_complete(&[
            header(Some(vec![task(true)])),
            header(Some(vec![task(false)])),
        ]));
        assert!(!is_service_complete(&[header(None)]));
        assert!(!is_service_complete(&[header(Some(Vec::new()))]));
    }

    #[test]
    fn transitions() {
        assert_eq!(plan_transition(false, false, true), Transition::None);
        assert_eq!(plan_transition(true, true, true), Transition::None);
        assert_eq!(plan_transition(false, true, false), Transition::Complete);
        assert_eq!(plan_transition(true, false, true), Transition::Reopen);
        assert_eq!(plan_transition(true, false, false), Transition::Suppressed);
        assert_eq!(Transition::Suppressed.write_value(), None);
        assert_eq!(Transition::Reopen.write_value(), Some(false));
    }
}
