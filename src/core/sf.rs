//! Salesforce CLI wrapper.

use serde::Deserialize;

use crate::error::{Error, ErrorCode, Result};
use crate::utils::command;

const TOOL: &str = "sf";

#[derive(Deserialize)]
struct OrgDisplay {
    result: OrgDisplayResult,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrgDisplayResult {
    #[serde(default)]
    sfdx_auth_url: Option<String>,
}

/// Check the CLI is on PATH and return its version line.
pub fn ensure_installed() -> Result<String> {
    let args = vec!["--version".to_string()];
    let output = command::capture(TOOL, &args, None).map_err(|e| {
        if matches!(e.code, ErrorCode::ToolNotInstalled) {
            e.with_hint("Install the Salesforce CLI: npm install -g @salesforce/cli")
        } else {
            e
        }
    })?;

    if !output.success {
        return Err(Error::tool_command_failed(
            TOOL,
            "sf --version",
            output.exit_code,
            output.stderr,
        ));
    }

    Ok(output.stdout.trim().to_string())
}

/// Open the browser login flow for a new org alias.
pub fn login_interactive(alias: &str) -> Result<()> {
    let args: Vec<String> = ["org", "login", "web", "--alias", alias]
        .iter()
        .map(|a| a.to_string())
        .collect();

    let code = command::run_interactive(TOOL, &args, None)?;
    if code != 0 {
        return Err(Error::tool_command_failed(
            TOOL,
            format!("sf org login web --alias {}", alias),
            code,
            String::new(),
        ));
    }

    Ok(())
}

/// Fetch the sfdxAuthUrl for an authenticated org.
pub fn auth_url(org: &str) -> Result<String> {
    let args: Vec<String> = ["org", "display", "--target-org", org, "--verbose", "--json"]
        .iter()
        .map(|a| a.to_string())
        .collect();

    let output = command::capture(TOOL, &args, None)?;
    if !output.success {
        return Err(Error::tool_command_failed(
            TOOL,
            format!("sf org display --target-org {}", org),
            output.exit_code,
            output.stderr,
        ));
    }

    parse_auth_url(&output.stdout, org)
}

fn parse_auth_url(stdout: &str, org: &str) -> Result<String> {
    let parsed: OrgDisplay = serde_json::from_str(stdout).map_err(|e| {
        Error::internal_json(e.to_string(), Some("parse sf org display output".to_string()))
    })?;

    parsed
        .result
        .sfdx_auth_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| {
            Error::new(
                ErrorCode::ToolCommandFailed,
                format!("sf org display for '{}' did not include an sfdxAuthUrl", org),
                serde_json::json!({ "tool": TOOL, "org": org }),
            )
            .with_hint(format!("Re-authenticate with: sf org login web --alias {}", org))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_auth_url_from_org_display() {
        let stdout = r#"{
            "status": 0,
            "result": {
                "id": "00D000000000001EAA",
                "alias": "dev",
                "sfdxAuthUrl": "force://PlatformCLI::token@example.my.salesforce.com"
            }
        }"#;

        let url = parse_auth_url(stdout, "dev").unwrap();
        assert_eq!(url, "force://PlatformCLI::token@example.my.salesforce.com");
    }

    #[test]
    fn missing_auth_url_is_an_error() {
        let stdout = r#"{ "status": 0, "result": { "alias": "dev" } }"#;

        let err = parse_auth_url(stdout, "dev").unwrap_err();
        assert_eq!(err.code.as_str(), "tool.command_failed");
        assert!(err.message.contains("sfdxAuthUrl"));
    }

    #[test]
    fn garbage_output_is_a_json_error() {
        let err = parse_auth_url("not json", "dev").unwrap_err();
        assert_eq!(err.code.as_str(), "internal.json_error");
    }
}
