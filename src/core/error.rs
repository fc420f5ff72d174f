use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidValue,

    ValidationMissingArgument,
    ValidationInvalidArgument,
    ValidationInvalidJson,

    IdentityUnresolved,

    RemoteAuthFailed,
    RemotePermissionDenied,
    RemoteNotFound,
    RemoteNameConflict,
    RemoteRequestFailed,

    ToolNotInstalled,
    ToolCommandFailed,

    GitCommandFailed,

    ArchiveInvalid,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",
            ErrorCode::ValidationInvalidJson => "validation.invalid_json",

            ErrorCode::IdentityUnresolved => "identity.unresolved",

            ErrorCode::RemoteAuthFailed => "remote.auth_failed",
            ErrorCode::RemotePermissionDenied => "remote.permission_denied",
            ErrorCode::RemoteNotFound => "remote.not_found",
            ErrorCode::RemoteNameConflict => "remote.name_conflict",
            ErrorCode::RemoteRequestFailed => "remote.request_failed",

            ErrorCode::ToolNotInstalled => "tool.not_installed",
            ErrorCode::ToolCommandFailed => "tool.command_failed",

            ErrorCode::GitCommandFailed => "git.command_failed",

            ErrorCode::ArchiveInvalid => "archive.invalid",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUnresolvedDetails {
    pub sources_tried: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFailureDetails {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCommandFailedDetails {
    pub tool: String,
    pub command: String,
    pub exit_code: i32,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveInvalidDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        let details = serde_json::to_value(MissingArgumentDetails { args })
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            details,
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = serde_json::to_value(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            id,
            tried,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn validation_invalid_json(err: serde_json::Error, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": err.to_string(),
            "context": context,
        });

        Self::new(ErrorCode::ValidationInvalidJson, "Invalid JSON", details)
    }

    pub fn identity_unresolved(sources_tried: Vec<String>) -> Self {
        let details = serde_json::to_value(IdentityUnresolvedDetails { sources_tried })
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::IdentityUnresolved,
            "Could not resolve a project identity",
            details,
        )
        .with_hint("Pass --repo-name, or --display-name, --api-name, and --label together")
        .with_hint("Remove --non-interactive to be prompted for a name")
    }

    pub fn remote_auth_failed(url: impl Into<String>) -> Self {
        Self::remote_status(
            ErrorCode::RemoteAuthFailed,
            "Authentication failed",
            url,
            Some(401),
            None,
        )
        .with_hint("Check that the token is valid and has not expired")
    }

    pub fn remote_permission_denied(url: impl Into<String>) -> Self {
        Self::remote_status(
            ErrorCode::RemotePermissionDenied,
            "Permission denied",
            url,
            Some(403),
            None,
        )
        .with_hint("The token needs the 'repo' scope (and 'workflow' for secrets)")
    }

    pub fn remote_not_found(url: impl Into<String>) -> Self {
        Self::remote_status(
            ErrorCode::RemoteNotFound,
            "Remote resource not found",
            url,
            Some(404),
            None,
        )
        .with_hint("Check the owner and repository name")
    }

    pub fn remote_name_conflict(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::remote_status(ErrorCode::RemoteNameConflict, message, url, Some(422), None)
    }

    pub fn remote_request_failed(
        url: impl Into<String>,
        status: Option<u16>,
        body: Option<String>,
    ) -> Self {
        Self::remote_status(
            ErrorCode::RemoteRequestFailed,
            "Remote request failed",
            url,
            status,
            body,
        )
    }

    fn remote_status(
        code: ErrorCode,
        message: impl Into<String>,
        url: impl Into<String>,
        status: Option<u16>,
        body: Option<String>,
    ) -> Self {
        let details = serde_json::to_value(RemoteFailureDetails {
            url: url.into(),
            status,
            body,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(code, message, details)
    }

    pub fn tool_not_installed(tool: impl Into<String>) -> Self {
        let tool = tool.into();
        Self::new(
            ErrorCode::ToolNotInstalled,
            format!("Required tool '{}' is not installed", tool),
            serde_json::json!({ "tool": tool }),
        )
    }

    pub fn tool_command_failed(
        tool: impl Into<String>,
        command: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        let details = serde_json::to_value(ToolCommandFailedDetails {
            tool: tool.into(),
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(ErrorCode::ToolCommandFailed, "Tool command failed", details)
    }

    pub fn git_command_failed(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::GitCommandFailed,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = serde_json::to_value(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn archive_invalid(path: Option<String>, error: impl Into<String>) -> Self {
        let details = serde_json::to_value(ArchiveInvalidDetails {
            path,
            error: error.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(ErrorCode::ArchiveInvalid, "Invalid archive", details)
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = serde_json::to_value(InternalIoErrorDetails {
            error: error.into(),
            context,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = serde_json::to_value(InternalJsonErrorDetails {
            error: error.into(),
            context,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_serialize_as_dotted_strings() {
        assert_eq!(ErrorCode::IdentityUnresolved.as_str(), "identity.unresolved");
        assert_eq!(ErrorCode::RemoteNameConflict.as_str(), "remote.name_conflict");
        assert_eq!(ErrorCode::InternalIoError.as_str(), "internal.io_error");
    }

    #[test]
    fn with_hint_accumulates() {
        let err = Error::git_command_failed("boom")
            .with_hint("first")
            .with_hint("second");
        assert_eq!(err.hints.len(), 2);
        assert_eq!(err.hints[0].message, "first");
    }

    #[test]
    fn identity_unresolved_carries_sources() {
        let err = Error::identity_unresolved(vec!["explicit".into(), "repo name".into()]);
        assert_eq!(err.code, ErrorCode::IdentityUnresolved);
        assert_eq!(err.details["sourcesTried"][1], "repo name");
        assert!(!err.hints.is_empty());
    }
}
