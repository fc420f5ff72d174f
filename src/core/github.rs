//! GitHub REST client for fork setup and Actions secrets.
//!
//! All calls are blocking. Errors carry the request URL and map HTTP status
//! to the remote error codes; 422 on rename is recovered by reusing an
//! existing repository with the target name.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use crypto_box::aead::OsRng;
use regex::Regex;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorCode, Result};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const API_ROOT: &str = "https://api.github.com";
const FORK_POLL_ATTEMPTS: u32 = 30;
const FORK_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepoInfo {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub owner: RepoOwner,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepoOwner {
    pub login: String,
}

/// Body of a fork request; the owner is not always populated while the
/// fork is still being created.
#[derive(Debug, Deserialize)]
pub struct ForkResponse {
    pub owner: Option<RepoOwner>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub login: String,
    pub scopes: Vec<String>,
}

#[derive(Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Deserialize)]
struct ActionsPublicKey {
    key_id: String,
    key: String,
}

pub struct GitHubClient {
    client: Client,
    token: String,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("imprint/{}", VERSION))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::internal_io(e.to_string(), Some("create HTTP client".to_string())))?;

        Ok(Self {
            client,
            token: token.into(),
        })
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
    }

    fn send(&self, url: &str, builder: RequestBuilder) -> Result<(StatusCode, String)> {
        let response: Response = self
            .authorize(builder)
            .send()
            .map_err(|e| Error::remote_request_failed(url, None, Some(e.to_string())))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| Error::remote_request_failed(url, None, Some(e.to_string())))?;

        Ok((status, body))
    }

    /// Check the token against `GET /user` and report its login and scopes.
    pub fn verify_token(&self) -> Result<TokenInfo> {
        let url = format!("{}/user", API_ROOT);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .map_err(|e| Error::remote_request_failed(&url, None, Some(e.to_string())))?;

        let status = response.status();
        let scopes = response
            .headers()
            .get("X-OAuth-Scopes")
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let body = response
            .text()
            .map_err(|e| Error::remote_request_failed(&url, None, Some(e.to_string())))?;

        if !status.is_success() {
            return Err(status_error(&url, status, &body));
        }

        let user: UserResponse = parse_json(&url, &body)?;
        Ok(TokenInfo {
            login: user.login,
            scopes,
        })
    }

    /// Look up a repository; `Ok(None)` when it does not exist.
    pub fn get_repo(&self, owner: &str, repo: &str) -> Result<Option<RepoInfo>> {
        let url = repo_url(owner, repo);
        let (status, body) = self.send(&url, self.client.get(&url))?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(&url, status, &body));
        }

        Ok(Some(parse_json(&url, &body)?))
    }

    /// Fork a repository into the token holder's account.
    ///
    /// GitHub answers 202 and creates the fork asynchronously; follow with
    /// [`GitHubClient::poll_until_ready`]. Forking an already-forked
    /// repository returns the existing fork.
    pub fn fork(&self, owner: &str, repo: &str) -> Result<ForkResponse> {
        let url = format!("{}/forks", repo_url(owner, repo));
        let (status, body) = self.send(&url, self.client.post(&url))?;

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(Error::remote_name_conflict(
                format!("Fork of {}/{} was rejected: {}", owner, repo, summarize(&body)),
                url,
            ));
        }
        if !status.is_success() {
            return Err(status_error(&url, status, &body));
        }

        parse_json(&url, &body)
    }

    /// Wait for an asynchronously created fork to become fetchable.
    ///
    /// Returns false on timeout; the fork usually finishes shortly after, so
    /// the caller should warn rather than fail.
    pub fn poll_until_ready(&self, owner: &str, repo: &str) -> bool {
        for attempt in 0..FORK_POLL_ATTEMPTS {
            if attempt > 0 {
                std::thread::sleep(FORK_POLL_INTERVAL);
            }
            match self.get_repo(owner, repo) {
                Ok(Some(_)) => return true,
                Ok(None) => continue,
                Err(e) => {
                    crate::log_status!("github", "Fork poll failed: {}", e);
                    continue;
                }
            }
        }
        false
    }

    /// Rename a repository. A no-op when the name already matches; a 422
    /// falls back to an existing repository with the target name.
    pub fn rename(&self, owner: &str, repo: &str, new_name: &str) -> Result<RepoInfo> {
        validate_repo_name(new_name)?;

        let url = repo_url(owner, repo);
        if repo == new_name {
            return self
                .get_repo(owner, repo)?
                .ok_or_else(|| Error::remote_not_found(&url));
        }

        let body = serde_json::json!({ "name": new_name });
        let (status, text) = self.send(&url, self.client.patch(&url).json(&body))?;

        if status.is_success() {
            return parse_json(&url, &text);
        }

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            if let Some(existing) = self.get_repo(owner, new_name)? {
                crate::log_status!(
                    "github",
                    "Repository {} already exists, using it",
                    existing.full_name
                );
                return Ok(existing);
            }
            return Err(Error::remote_name_conflict(
                format!("Could not rename {} to {}: {}", repo, new_name, summarize(&text)),
                url,
            ));
        }

        Err(status_error(&url, status, &text))
    }

    /// Store an encrypted Actions secret via the repository's public key.
    pub fn create_secret(&self, owner: &str, repo: &str, name: &str, value: &str) -> Result<()> {
        let key_url = format!("{}/actions/secrets/public-key", repo_url(owner, repo));
        let (status, body) = self.send(&key_url, self.client.get(&key_url))?;
        if !status.is_success() {
            return Err(status_error(&key_url, status, &body));
        }
        let public_key: ActionsPublicKey = parse_json(&key_url, &body)?;

        let encrypted_value = seal_secret(&public_key.key, value)?;
        let payload = serde_json::json!({
            "encrypted_value": encrypted_value,
            "key_id": public_key.key_id,
        });

        let secret_url = format!("{}/actions/secrets/{}", repo_url(owner, repo), name);
        let (status, body) = self.send(&secret_url, self.client.put(&secret_url).json(&payload))?;
        if !status.is_success() {
            return Err(status_error(&secret_url, status, &body));
        }

        Ok(())
    }
}

/// What the fork flow ended up with.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkOutcome {
    pub owner: String,
    pub repo: String,
    pub url: String,
    /// False when the readiness poll timed out; the fork usually catches up.
    pub ready: bool,
    pub renamed: bool,
    /// True when an existing fork or same-named repository was reused.
    pub reused: bool,
}

/// Fork a repository, wait for it, and optionally rename the result.
///
/// A 422 on the fork means the repository was already forked (or the name is
/// taken); in that case the existing fork is found under the token holder's
/// account and reused, renaming it if a new name was requested. A repository
/// already bearing the target name also counts as success.
pub fn fork_and_rename(
    client: &GitHubClient,
    source_owner: &str,
    source_repo: &str,
    new_name: Option<&str>,
) -> Result<ForkOutcome> {
    if let Some(name) = new_name {
        validate_repo_name(name)?;
    }

    let fork = match client.fork(source_owner, source_repo) {
        Ok(fork) => fork,
        Err(e) if matches!(e.code, ErrorCode::RemoteNameConflict) => {
            return reuse_existing_fork(client, source_repo, new_name, e);
        }
        Err(e) => return Err(e),
    };

    let owner = match fork.owner {
        Some(owner) => owner.login,
        None => client.verify_token()?.login,
    };
    crate::log_status!("github", "Fork initiated, waiting for {}/{}", owner, source_repo);

    let ready = client.poll_until_ready(&owner, source_repo);
    if !ready {
        crate::log_status!("github", "Fork may still be processing, continuing");
    }

    match new_name {
        Some(name) if name != source_repo => {
            let renamed = client.rename(&owner, source_repo, name)?;
            Ok(ForkOutcome {
                owner,
                repo: renamed.name,
                url: renamed.html_url,
                ready,
                renamed: true,
                reused: false,
            })
        }
        _ => Ok(ForkOutcome {
            url: format!("https://github.com/{}/{}", owner, source_repo),
            owner,
            repo: source_repo.to_string(),
            ready,
            renamed: false,
            reused: false,
        }),
    }
}

fn reuse_existing_fork(
    client: &GitHubClient,
    source_repo: &str,
    new_name: Option<&str>,
    fork_error: Error,
) -> Result<ForkOutcome> {
    let login = client.verify_token()?.login;
    crate::log_status!(
        "github",
        "Fork rejected, looking for an existing fork under {}",
        login
    );

    if let Some(existing) = client.get_repo(&login, source_repo)? {
        return match new_name {
            Some(name) if name != source_repo => {
                let renamed = client.rename(&login, source_repo, name)?;
                Ok(ForkOutcome {
                    owner: login,
                    repo: renamed.name,
                    url: renamed.html_url,
                    ready: true,
                    renamed: true,
                    reused: true,
                })
            }
            _ => Ok(ForkOutcome {
                owner: login,
                repo: existing.name,
                url: existing.html_url,
                ready: true,
                renamed: false,
                reused: true,
            }),
        };
    }

    if let Some(name) = new_name {
        if let Some(existing) = client.get_repo(&login, name)? {
            crate::log_status!("github", "Repository {} already exists", existing.full_name);
            return Ok(ForkOutcome {
                owner: login,
                repo: existing.name,
                url: existing.html_url,
                ready: true,
                renamed: false,
                reused: true,
            });
        }
    }

    Err(fork_error)
}

fn repo_url(owner: &str, repo: &str) -> String {
    format!("{}/repos/{}/{}", API_ROOT, owner, repo)
}

fn parse_json<T: serde::de::DeserializeOwned>(url: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        Error::internal_json(e.to_string(), Some(format!("parse response from {}", url)))
    })
}

fn status_error(url: &str, status: StatusCode, body: &str) -> Error {
    match status.as_u16() {
        401 => Error::remote_auth_failed(url),
        403 => Error::remote_permission_denied(url),
        404 => Error::remote_not_found(url),
        code => Error::remote_request_failed(url, Some(code), Some(summarize(body))),
    }
}

fn summarize(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() > 500 {
        format!("{}...", &trimmed[..500])
    } else {
        trimmed.to_string()
    }
}

/// GitHub repository names: letters, digits, `.`, `_`, `-`.
pub fn validate_repo_name(name: &str) -> Result<()> {
    let re = Regex::new(r"^[A-Za-z0-9._-]+$").expect("Invalid regex pattern");
    if name.is_empty() || !re.is_match(name) {
        return Err(Error::validation_invalid_argument(
            "name",
            "Repository names may only contain letters, numbers, '.', '_' and '-'",
            Some(name.to_string()),
            None,
        ));
    }
    Ok(())
}

/// Seal a secret value to a repository's base64-encoded public key.
fn seal_secret(public_key_b64: &str, value: &str) -> Result<String> {
    let key_bytes = B64
        .decode(public_key_b64)
        .map_err(|e| Error::internal_unexpected(format!("Invalid secrets public key: {}", e)))?;

    let key_bytes: [u8; 32] = key_bytes
        .try_into()
        .map_err(|_| Error::internal_unexpected("Secrets public key is not 32 bytes"))?;

    let public_key = crypto_box::PublicKey::from(key_bytes);
    let sealed = public_key
        .seal(&mut OsRng, value.as_bytes())
        .map_err(|e| Error::internal_unexpected(format!("Failed to encrypt secret: {}", e)))?;

    Ok(B64.encode(sealed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_names_are_validated() {
        assert!(validate_repo_name("Food-Bank").is_ok());
        assert!(validate_repo_name("Good-Name_1.2").is_ok());

        assert!(validate_repo_name("").is_err());
        assert!(validate_repo_name("has space").is_err());
        assert!(validate_repo_name("slash/name").is_err());

        let err = validate_repo_name("bad name!").unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn status_errors_map_to_codes() {
        let url = "https://api.github.com/repos/a/b";
        assert_eq!(
            status_error(url, StatusCode::UNAUTHORIZED, "").code.as_str(),
            "remote.auth_failed"
        );
        assert_eq!(
            status_error(url, StatusCode::FORBIDDEN, "").code.as_str(),
            "remote.permission_denied"
        );
        assert_eq!(
            status_error(url, StatusCode::NOT_FOUND, "").code.as_str(),
            "remote.not_found"
        );
        assert_eq!(
            status_error(url, StatusCode::INTERNAL_SERVER_ERROR, "boom")
                .code
                .as_str(),
            "remote.request_failed"
        );
    }

    #[test]
    fn sealed_secret_opens_with_the_matching_key() {
        let secret_key = crypto_box::SecretKey::generate(&mut OsRng);
        let public_b64 = B64.encode(secret_key.public_key().as_bytes());

        let sealed = seal_secret(&public_b64, "force://auth-url").unwrap();
        assert_ne!(sealed, "force://auth-url");

        let sealed_bytes = B64.decode(&sealed).unwrap();
        let opened = secret_key.unseal(&sealed_bytes).unwrap();
        assert_eq!(opened, b"force://auth-url");
    }

    #[test]
    fn bad_public_keys_are_rejected() {
        assert!(seal_secret("not base64!!!", "value").is_err());

        let short = B64.encode([1u8; 16]);
        let err = seal_secret(&short, "value").unwrap_err();
        assert_eq!(err.code.as_str(), "internal.unexpected");
    }

    #[test]
    fn repo_info_parses_api_response() {
        let body = r#"{
            "name": "food-bank",
            "full_name": "dev/food-bank",
            "html_url": "https://github.com/dev/food-bank",
            "owner": { "login": "dev" },
            "fork": true
        }"#;

        let info: RepoInfo = parse_json("https://api.github.com/repos/dev/food-bank", body).unwrap();
        assert_eq!(info.owner.login, "dev");
        assert_eq!(info.name, "food-bank");
    }

    #[test]
    fn fork_response_tolerates_missing_owner() {
        let body = r#"{ "name": "food-bank" }"#;

        let fork: ForkResponse = parse_json("https://api.github.com/repos/a/b/forks", body).unwrap();
        assert!(fork.owner.is_none());
    }
}
