use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::HarvestError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: CommandStatus,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

impl ExecutionOutcome {
    pub fn success(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::Ok,
            message: message.into(),
            details,
        }
    }

    pub fn failure(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::Failure,
            message: message.into(),
            details,
        }
    }

    pub fn user_error(message: impl Into<String>, details: Value) -> Self {
        Self {
            status: CommandStatus::UserError,
            message: message.into(),
            details,
        }
    }

    /// Run-level errors: bad invocations are the user's to fix, the rest are failures.
    #[must_use]
    pub fn from_error(err: &HarvestError) -> Self {
        let details = json!({ "kind": err.kind(), "error": err.to_string() });
        match err {
            HarvestError::Usage { .. } | HarvestError::InvalidPackageName { .. } => {
                Self::user_error(err.to_string(), details)
            }
            _ => Self::failure(err.to_string(), details),
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.status {
            CommandStatus::Ok => 0,
            CommandStatus::UserError => 1,
            CommandStatus::Failure => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    UserError,
    Failure,
}

/// `{status, message, details}` envelope printed by `--json`.
#[must_use]
pub fn to_json_response(command: &str, outcome: &ExecutionOutcome) -> Value {
    let status = match outcome.status {
        CommandStatus::Ok => "ok",
        CommandStatus::UserError => "user-error",
        CommandStatus::Failure => "error",
    };
    let details = match &outcome.details {
        Value::Object(_) => outcome.details.clone(),
        Value::Null => json!({}),
        other => json!({ "value": other }),
    };
    json!({
        "status": status,
        "message": format_status_message(command, &outcome.message),
        "details": details,
    })
}

#[must_use]
pub fn format_status_message(command: &str, message: &str) -> String {
    let prefix = format!("harvest {command}");
    if message.is_empty() {
        prefix
    } else if message.starts_with(&prefix) {
        message.to_string()
    } else {
        format!("{prefix}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn envelope_prefixes_command_and_wraps_scalars() {
        let outcome = ExecutionOutcome::success("done", json!(3));
        let payload = to_json_response("fetch", &outcome);
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "harvest fetch: done");
        assert_eq!(payload["details"]["value"], 3);
    }

    #[test]
    fn usage_errors_are_user_errors() {
        let usage = ExecutionOutcome::from_error(&HarvestError::Usage {
            message: "target directory /nope does not exist".into(),
        });
        assert_eq!(usage.status, CommandStatus::UserError);
        assert_eq!(usage.exit_code(), 1);

        let cache = ExecutionOutcome::from_error(&HarvestError::CacheIo {
            path: PathBuf::from("/tmp/info.json"),
            message: "permission denied".into(),
        });
        assert_eq!(cache.status, CommandStatus::Failure);
        assert_eq!(cache.details["kind"], "cache-io");
        assert_eq!(cache.exit_code(), 2);
    }
}
