//! GCP Authentication
//!
//! Handles authentication using Application Default Credentials (ADC),
//! service account keys, or a caller-supplied access token.

use super::error::Result;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default scopes for the device manager API
pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/cloudiot",
];

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Where credentials come from
#[derive(Debug, Clone, Default)]
pub enum CredentialSource {
    /// Application Default Credentials
    #[default]
    ApplicationDefault,
    /// A service account key file
    ServiceAccountKey(PathBuf),
    /// A pre-minted OAuth2 access token, used as-is
    AccessToken(String),
    /// Send no credentials (local emulators and tests)
    None,
}

#[derive(Clone)]
enum Source {
    Provider(Arc<dyn TokenProvider>),
    Static(String),
    Anonymous,
}

/// GCP credentials holder with token caching
#[derive(Clone)]
pub struct GcpCredentials {
    source: Source,
    scopes: Arc<Vec<String>>,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl GcpCredentials {
    /// Resolve credentials from a source, requesting the given scopes
    pub async fn new(source: &CredentialSource, scopes: &[String]) -> Result<Self> {
        let source = match source {
            CredentialSource::ApplicationDefault => Source::Provider(gcp_auth::provider().await?),
            CredentialSource::ServiceAccountKey(path) => {
                tracing::debug!("Loading service account key from {:?}", path);
                Source::Provider(Arc::new(CustomServiceAccount::from_file(path)?))
            }
            CredentialSource::AccessToken(token) => Source::Static(token.clone()),
            CredentialSource::None => Source::Anonymous,
        };

        let scopes = if scopes.is_empty() {
            DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
        } else {
            scopes.to_vec()
        };

        Ok(Self {
            source,
            scopes: Arc::new(scopes),
            token_cache: Arc::new(RwLock::new(None)),
        })
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Get an access token for API calls, or `None` for anonymous credentials
    pub async fn get_token(&self) -> Result<Option<String>> {
        let provider = match &self.source {
            Source::Anonymous => return Ok(None),
            Source::Static(token) => return Ok(Some(token.clone())),
            Source::Provider(provider) => provider,
        };

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(Some(cached.token.clone()));
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
        let token = provider.token(&scopes).await?;
        let token_str = token.as_str().to_string();

        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;
        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token_str.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            (DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(Some(token_str))
    }

    /// Drop any cached token and fetch a new one.
    ///
    /// Static and anonymous credentials return the same value as
    /// [`get_token`](Self::get_token).
    pub async fn refresh_token(&self) -> Result<Option<String>> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }
        self.get_token().await
    }

    /// Project the credentials belong to, when the provider knows it
    pub async fn project_id(&self) -> Option<String> {
        match &self.source {
            Source::Provider(provider) => provider.project_id().await.ok().map(|p| p.to_string()),
            _ => None,
        }
    }
}

/// Get the gcloud configuration directory
pub fn get_gcloud_config_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CLOUDSDK_CONFIG") {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir().map(|p| p.join("gcloud"))
}

/// Validate a GCP project ID format
/// Project IDs must be 6-30 characters, lowercase letters, digits, and hyphens
/// Must start with a letter and cannot end with a hyphen
pub fn validate_project_id(project: &str) -> bool {
    if project.len() < 6 || project.len() > 30 {
        return false;
    }

    match project.chars().next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }

    if project.ends_with('-') {
        return false;
    }

    project
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Read the default project from the environment or gcloud configuration
/// Security: Validates project ID format before returning
pub fn get_default_project() -> Option<String> {
    for var in ["CLOUDSDK_CORE_PROJECT", "GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"] {
        if let Ok(project) = std::env::var(var) {
            if validate_project_id(&project) {
                return Some(project);
            }
            tracing::warn!("Invalid project ID format in {}", var);
        }
    }

    let config_dir = get_gcloud_config_dir()?;

    let active_config_path = config_dir.join("active_config");
    let config_name = std::fs::read_to_string(&active_config_path)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "default".to_string());

    // Security: Validate config name to prevent path traversal
    if !config_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        tracing::warn!("Invalid characters in active_config name");
        return None;
    }

    let config_path = config_dir
        .join("configurations")
        .join(format!("config_{}", config_name));

    let content = std::fs::read_to_string(&config_path).ok()?;
    parse_core_project(&content)
}

/// Find `project = ...` inside the `[core]` section of a gcloud config file
fn parse_core_project(content: &str) -> Option<String> {
    let mut in_core_section = false;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line == "[core]" {
            in_core_section = true;
        } else if line.starts_with('[') {
            in_core_section = false;
        } else if in_core_section && line.starts_with("project") {
            if let Some((_, value)) = line.split_once('=') {
                let project = value.trim().to_string();
                if validate_project_id(&project) {
                    return Some(project);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_project_id() {
        assert!(validate_project_id("my-project-1"));
        assert!(!validate_project_id("short"));
        assert!(!validate_project_id("1project"));
        assert!(!validate_project_id("my-project-"));
        assert!(!validate_project_id("My-Project"));
    }

    #[test]
    fn test_parse_core_project() {
        let content = "[compute]\nzone = us-central1-a\n\n[core]\n# comment\naccount = me@example.com\nproject = iot-demo-42\n";
        assert_eq!(parse_core_project(content), Some("iot-demo-42".to_string()));
        assert_eq!(parse_core_project("[compute]\nproject = iot-demo-42\n"), None);
    }

    #[tokio::test]
    async fn test_static_and_anonymous_tokens() {
        let creds = GcpCredentials::new(&CredentialSource::AccessToken("tok".into()), &[])
            .await
            .unwrap();
        assert_eq!(creds.get_token().await.unwrap().as_deref(), Some("tok"));
        assert_eq!(creds.scopes().len(), DEFAULT_SCOPES.len());

        assert_eq!(creds.refresh_token().await.unwrap().as_deref(), Some("tok"));

        let creds = GcpCredentials::new(&CredentialSource::None, &[]).await.unwrap();
        assert_eq!(creds.get_token().await.unwrap(), None);
        assert_eq!(creds.refresh_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_custom_scopes_replace_defaults() {
        let scopes = vec!["https://www.googleapis.com/auth/cloudiot".to_string()];
        let creds = GcpCredentials::new(&CredentialSource::None, &scopes).await.unwrap();
        assert_eq!(creds.scopes(), scopes.as_slice());
    }
}
