//! Project identity resolution.
//!
//! An identity has three faces of the same name: the human-readable display
//! name, the API-safe name with every separator stripped, and the hyphenated
//! label used in paths. Resolution walks an ordered list of candidate
//! providers (explicit fields, repository name, project config file,
//! interactive prompt); the first provider with a complete answer wins, and
//! total failure aggregates the names of every provider that was consulted.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::project_config;
use crate::tokens;
use crate::tty;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectIdentity {
    pub display_name: String,
    pub api_name: String,
    pub hyphenated_label: String,
}

impl ProjectIdentity {
    /// Derive all three faces from a repository name.
    ///
    /// Hyphens and underscores become spaces in the display name, original
    /// casing preserved. The API name strips separators entirely.
    pub fn derive(repo_name: &str) -> Self {
        let display_name = repo_name.trim().replace(['-', '_'], " ");
        Self::from_display_name(&display_name)
    }

    /// Derive the API name and label from a display name.
    pub fn from_display_name(display_name: &str) -> Self {
        let display_name = display_name.trim().to_string();
        let api_name: String = display_name
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect();
        let hyphenated_label = display_name.replace(' ', "-");

        Self {
            display_name,
            api_name,
            hyphenated_label,
        }
    }

    /// Build from explicitly supplied fields, validating the API name.
    pub fn from_parts(
        display_name: impl Into<String>,
        api_name: impl Into<String>,
        hyphenated_label: impl Into<String>,
    ) -> Result<Self> {
        let api_name = api_name.into();
        if api_name.is_empty() || !api_name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::validation_invalid_argument(
                "apiName",
                "API name must be non-empty and contain only ASCII letters and digits",
                Some(api_name),
                None,
            ));
        }

        Ok(Self {
            display_name: display_name.into(),
            api_name,
            hyphenated_label: hyphenated_label.into(),
        })
    }
}

/// Where a resolved identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentitySource {
    Explicit,
    RepoName,
    ConfigFile,
    Prompt,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedIdentity {
    #[serde(flatten)]
    pub identity: ProjectIdentity,
    pub source: IdentitySource,
}

/// Inputs to resolution, gathered by the command layer.
///
/// Environment lookups happen before this struct is built so that
/// resolution itself is deterministic.
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    pub explicit_display_name: Option<String>,
    pub explicit_api_name: Option<String>,
    pub explicit_label: Option<String>,
    pub repo_name: Option<String>,
    pub repo_name_env: Option<String>,
    pub config_path: Option<PathBuf>,
    pub non_interactive: bool,
}

/// Repository name from the environment, if CI provides one.
pub fn repo_name_from_env() -> Option<String> {
    std::env::var("GITHUB_REPOSITORY_NAME")
        .ok()
        .or_else(|| std::env::var("REPO_NAME").ok())
        .filter(|v| !v.trim().is_empty())
}

trait IdentityProvider {
    fn name(&self) -> &'static str;
    fn source(&self) -> IdentitySource;
    /// `Ok(None)` means this provider has nothing to say; the next one runs.
    fn attempt(&self) -> Result<Option<ProjectIdentity>>;
}

struct ExplicitProvider {
    display_name: Option<String>,
    api_name: Option<String>,
    label: Option<String>,
}

impl IdentityProvider for ExplicitProvider {
    fn name(&self) -> &'static str {
        "explicit fields"
    }

    fn source(&self) -> IdentitySource {
        IdentitySource::Explicit
    }

    fn attempt(&self) -> Result<Option<ProjectIdentity>> {
        let given = [&self.display_name, &self.api_name, &self.label];
        if given.iter().all(|v| v.is_none()) {
            return Ok(None);
        }

        let mut missing = Vec::new();
        if self.display_name.is_none() {
            missing.push("--display-name".to_string());
        }
        if self.api_name.is_none() {
            missing.push("--api-name".to_string());
        }
        if self.label.is_none() {
            missing.push("--label".to_string());
        }
        if !missing.is_empty() {
            return Err(Error::validation_missing_argument(missing)
                .with_hint("--display-name, --api-name, and --label must be passed together"));
        }

        let identity = ProjectIdentity::from_parts(
            self.display_name.clone().unwrap_or_default(),
            self.api_name.clone().unwrap_or_default(),
            self.label.clone().unwrap_or_default(),
        )?;
        Ok(Some(identity))
    }
}

struct RepoNameProvider {
    flag: Option<String>,
    env: Option<String>,
}

impl IdentityProvider for RepoNameProvider {
    fn name(&self) -> &'static str {
        "repository name"
    }

    fn source(&self) -> IdentitySource {
        IdentitySource::RepoName
    }

    fn attempt(&self) -> Result<Option<ProjectIdentity>> {
        let repo_name = self
            .flag
            .as_deref()
            .or(self.env.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        Ok(repo_name.map(ProjectIdentity::derive))
    }
}

struct ConfigFileProvider {
    path: Option<PathBuf>,
}

impl IdentityProvider for ConfigFileProvider {
    fn name(&self) -> &'static str {
        "project config file"
    }

    fn source(&self) -> IdentitySource {
        IdentitySource::ConfigFile
    }

    fn attempt(&self) -> Result<Option<ProjectIdentity>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let Some(extracted) = project_config::extract_identity(path)? else {
            return Ok(None);
        };

        // A config file that still carries tokens has not been instantiated;
        // its values are placeholders, not answers.
        let values = [
            &extracted.project_name,
            &extracted.package_name,
            &extracted.name_managed,
        ];
        if values.iter().any(|v| tokens::contains_token(v)) {
            crate::log_status!(
                "identity",
                "{} still contains placeholder tokens, ignoring it",
                path.display()
            );
            return Ok(None);
        }

        Ok(Some(ProjectIdentity {
            display_name: extracted.project_name.clone(),
            api_name: extracted.package_name.clone(),
            hyphenated_label: extracted.name_managed.replace(' ', "-"),
        }))
    }
}

struct PromptProvider {
    non_interactive: bool,
}

impl IdentityProvider for PromptProvider {
    fn name(&self) -> &'static str {
        "interactive prompt"
    }

    fn source(&self) -> IdentitySource {
        IdentitySource::Prompt
    }

    fn attempt(&self) -> Result<Option<ProjectIdentity>> {
        if self.non_interactive || !tty::is_stdin_tty() {
            return Ok(None);
        }

        let display_name = tty::prompt("Project name (e.g. \"My Project\")")?;
        if display_name.is_empty() {
            return Err(Error::validation_invalid_argument(
                "displayName",
                "Project name cannot be empty",
                None,
                None,
            ));
        }

        Ok(Some(ProjectIdentity::from_display_name(&display_name)))
    }
}

/// Resolve a complete identity or fail with the list of consulted sources.
pub fn resolve(req: &ResolveRequest) -> Result<ResolvedIdentity> {
    let providers: Vec<Box<dyn IdentityProvider>> = vec![
        Box::new(ExplicitProvider {
            display_name: req.explicit_display_name.clone(),
            api_name: req.explicit_api_name.clone(),
            label: req.explicit_label.clone(),
        }),
        Box::new(RepoNameProvider {
            flag: req.repo_name.clone(),
            env: req.repo_name_env.clone(),
        }),
        Box::new(ConfigFileProvider {
            path: req.config_path.clone(),
        }),
        Box::new(PromptProvider {
            non_interactive: req.non_interactive,
        }),
    ];

    let mut tried = Vec::new();
    for provider in providers {
        tried.push(provider.name().to_string());
        if let Some(identity) = provider.attempt()? {
            return Ok(ResolvedIdentity {
                identity,
                source: provider.source(),
            });
        }
    }

    Err(Error::identity_unresolved(tried))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn derive_splits_separators_into_spaces() {
        let identity = ProjectIdentity::derive("My-Project_Name");
        assert_eq!(identity.display_name, "My Project Name");
        assert_eq!(identity.api_name, "MyProjectName");
        assert_eq!(identity.hyphenated_label, "My-Project-Name");
    }

    #[test]
    fn derive_preserves_casing() {
        let identity = ProjectIdentity::derive("NPSP-extension");
        assert_eq!(identity.display_name, "NPSP extension");
        assert_eq!(identity.api_name, "NPSPextension");
    }

    #[test]
    fn from_parts_rejects_separators_in_api_name() {
        let err = ProjectIdentity::from_parts("My Project", "My Project", "My-Project")
            .unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn explicit_fields_win() {
        let req = ResolveRequest {
            explicit_display_name: Some("Acme App".to_string()),
            explicit_api_name: Some("AcmeApp".to_string()),
            explicit_label: Some("Acme-App".to_string()),
            repo_name: Some("other-name".to_string()),
            non_interactive: true,
            ..Default::default()
        };
        let resolved = resolve(&req).unwrap();
        assert_eq!(resolved.source, IdentitySource::Explicit);
        assert_eq!(resolved.identity.api_name, "AcmeApp");
    }

    #[test]
    fn partial_explicit_fields_are_an_error() {
        let req = ResolveRequest {
            explicit_display_name: Some("Acme App".to_string()),
            non_interactive: true,
            ..Default::default()
        };
        let err = resolve(&req).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.missing_argument");
    }

    #[test]
    fn repo_name_beats_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("cumulusci.yml");
        fs::write(
            &config,
            "project:\n    name: Config Project\n    package:\n        name: ConfigProject\n",
        )
        .unwrap();

        let req = ResolveRequest {
            repo_name: Some("Repo-Project".to_string()),
            config_path: Some(config),
            non_interactive: true,
            ..Default::default()
        };
        let resolved = resolve(&req).unwrap();
        assert_eq!(resolved.source, IdentitySource::RepoName);
        assert_eq!(resolved.identity.display_name, "Repo Project");
    }

    #[test]
    fn env_repo_name_is_used_when_flag_is_absent() {
        let req = ResolveRequest {
            repo_name_env: Some("Env-Project".to_string()),
            non_interactive: true,
            ..Default::default()
        };
        let resolved = resolve(&req).unwrap();
        assert_eq!(resolved.source, IdentitySource::RepoName);
        assert_eq!(resolved.identity.api_name, "EnvProject");
    }

    #[test]
    fn config_file_with_tokens_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("cumulusci.yml");
        fs::write(
            &config,
            "project:\n    name: __PROJECT_NAME__\npackage:\n    name: __PROJECT_NAME__\n",
        )
        .unwrap();

        let req = ResolveRequest {
            config_path: Some(config),
            non_interactive: true,
            ..Default::default()
        };
        let err = resolve(&req).unwrap_err();
        assert_eq!(err.code.as_str(), "identity.unresolved");
    }

    #[test]
    fn config_file_resolves_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("cumulusci.yml");
        fs::write(
            &config,
            concat!(
                "project:\n",
                "    name: Food Bank\n",
                "    package:\n",
                "        name: FoodBank\n",
                "        name_managed: Food Bank\n",
            ),
        )
        .unwrap();

        let req = ResolveRequest {
            config_path: Some(config),
            non_interactive: true,
            ..Default::default()
        };
        let resolved = resolve(&req).unwrap();
        assert_eq!(resolved.source, IdentitySource::ConfigFile);
        assert_eq!(resolved.identity.display_name, "Food Bank");
        assert_eq!(resolved.identity.api_name, "FoodBank");
        assert_eq!(resolved.identity.hyphenated_label, "Food-Bank");
    }

    #[test]
    fn unresolved_error_names_every_source() {
        let req = ResolveRequest {
            non_interactive: true,
            ..Default::default()
        };
        let err = resolve(&req).unwrap_err();
        assert_eq!(err.code.as_str(), "identity.unresolved");
        let tried = err.details["sourcesTried"].as_array().unwrap();
        assert_eq!(tried.len(), 4);
    }
}
