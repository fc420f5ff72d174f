//! Placeholder tokens and find/replace patterns.
//!
//! Template trees carry two placeholder tokens. `__PROJECT_NAME__` becomes
//! the API-safe name and `__PROJECT_LABEL__` becomes the hyphenated label.
//! Each token is meant to be replaced exactly once, at instantiation.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::ProjectIdentity;

pub const PROJECT_NAME_TOKEN: &str = "__PROJECT_NAME__";
pub const PROJECT_LABEL_TOKEN: &str = "__PROJECT_LABEL__";

/// True if the string still contains any placeholder token.
pub fn contains_token(s: &str) -> bool {
    s.contains(PROJECT_NAME_TOKEN) || s.contains(PROJECT_LABEL_TOKEN)
}

/// A single identity field, usable as a deferred replacement target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentityField {
    DisplayName,
    ApiName,
    HyphenatedLabel,
}

/// One find/replace rule.
///
/// The replacement is either a literal string or a reference to an identity
/// field that gets resolved when an identity is available. Exactly one of
/// `replace` and `replace_field` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindReplacePattern {
    pub find: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_field: Option<IdentityField>,
}

impl FindReplacePattern {
    pub fn literal(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: Some(replace.into()),
            replace_field: None,
        }
    }

    pub fn field(find: impl Into<String>, field: IdentityField) -> Self {
        Self {
            find: find.into(),
            replace: None,
            replace_field: Some(field),
        }
    }

    /// Resolve to a concrete pattern, substituting identity fields.
    pub fn resolve(&self, identity: Option<&ProjectIdentity>) -> Result<ResolvedPattern> {
        if self.find.is_empty() {
            return Err(Error::validation_invalid_argument(
                "find",
                "Pattern 'find' string cannot be empty",
                None,
                None,
            ));
        }

        let replace = match (&self.replace, &self.replace_field) {
            (Some(literal), None) => literal.clone(),
            (None, Some(field)) => {
                let identity = identity.ok_or_else(|| {
                    Error::validation_invalid_argument(
                        "replaceField",
                        "Pattern references an identity field but no identity was resolved",
                        None,
                        None,
                    )
                })?;
                match field {
                    IdentityField::DisplayName => identity.display_name.clone(),
                    IdentityField::ApiName => identity.api_name.clone(),
                    IdentityField::HyphenatedLabel => identity.hyphenated_label.clone(),
                }
            }
            _ => {
                return Err(Error::validation_invalid_argument(
                    "replace",
                    "Exactly one of 'replace' and 'replaceField' must be set",
                    Some(self.find.clone()),
                    None,
                ));
            }
        };

        Ok(ResolvedPattern {
            find: self.find.clone(),
            replace,
        })
    }
}

/// A pattern with its replacement fully resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPattern {
    pub find: String,
    pub replace: String,
}

impl ResolvedPattern {
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
        }
    }

    pub fn matches(&self, s: &str) -> bool {
        s.contains(&self.find)
    }

    pub fn apply(&self, s: &str) -> String {
        s.replace(&self.find, &self.replace)
    }
}

/// The standard token patterns for a resolved identity.
///
/// Ordering matters: later patterns see the output of earlier ones.
pub fn identity_patterns(identity: &ProjectIdentity) -> Vec<ResolvedPattern> {
    vec![
        ResolvedPattern::new(PROJECT_NAME_TOKEN, identity.api_name.clone()),
        ResolvedPattern::new(PROJECT_LABEL_TOKEN, identity.hyphenated_label.clone()),
    ]
}

/// Apply every pattern in order to a string.
pub fn apply_all(text: &str, patterns: &[ResolvedPattern]) -> String {
    let mut out = text.to_string();
    for pattern in patterns {
        out = pattern.apply(&out);
    }
    out
}

/// Parse an ordered pattern list from a JSON array.
pub fn patterns_from_json(json: &str) -> Result<Vec<FindReplacePattern>> {
    serde_json::from_str(json)
        .map_err(|e| Error::validation_invalid_json(e, Some("patterns".to_string())))
}
