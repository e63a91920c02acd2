use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const PLACEHOLDER_API_HASH: &str = "your_api_hash_here";
const PLACEHOLDER_PHONE: &str = "+1234567890";

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TDFETCH_API_ID must be an integer, got {0:?}")]
    ApiIdFormat(String),
    #[error("API ID must be a valid positive integer")]
    InvalidApiId,
    #[error("API hash is missing or still set to the placeholder value")]
    InvalidApiHash,
    #[error("phone number is missing or still set to the placeholder value")]
    InvalidPhone,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub api_id: Option<i32>,
    pub api_hash: Option<String>,
    pub phone: Option<String>,
    pub updated_at: Option<i64>,
}

/// Validated credentials, ready for `setTdlibParameters`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_id: i32,
    pub api_hash: String,
    pub phone: String,
}

impl Credentials {
    pub fn validate(&self) -> Result<ApiCredentials, CredentialsError> {
        let api_id = self.api_id.filter(|id| *id > 0).ok_or(CredentialsError::InvalidApiId)?;
        let api_hash = self
            .api_hash
            .as_deref()
            .map(str::trim)
            .filter(|hash| !hash.is_empty() && *hash != PLACEHOLDER_API_HASH)
            .ok_or(CredentialsError::InvalidApiHash)?;
        let phone = self
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|phone| !phone.is_empty() && *phone != PLACEHOLDER_PHONE)
            .ok_or(CredentialsError::InvalidPhone)?;
        Ok(ApiCredentials {
            api_id,
            api_hash: api_hash.to_string(),
            phone: phone.to_string(),
        })
    }
}

impl ApiCredentials {
    pub fn masked_api_hash(&self) -> String {
        mask(&self.api_hash, 8)
    }

    pub fn masked_phone(&self) -> String {
        mask(&self.phone, 3)
    }
}

fn mask(value: &str, visible: usize) -> String {
    let shown: String = value.chars().take(visible).collect();
    let hidden = value.chars().count().saturating_sub(visible);
    format!("{shown}{}", "*".repeat(hidden))
}

pub struct CredentialsStore {
    path: PathBuf,
}

impl CredentialsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File contents with `TDFETCH_API_ID`, `TDFETCH_API_HASH` and
    /// `TDFETCH_PHONE` taking precedence.
    pub fn load(&self) -> Result<Credentials, CredentialsError> {
        let mut credentials = self.load_file()?;
        if let Some(api_id) = non_empty_env("TDFETCH_API_ID") {
            let parsed = api_id
                .trim()
                .parse()
                .map_err(|_| CredentialsError::ApiIdFormat(api_id.clone()))?;
            credentials.api_id = Some(parsed);
        }
        if let Some(api_hash) = non_empty_env("TDFETCH_API_HASH") {
            credentials.api_hash = Some(api_hash);
        }
        if let Some(phone) = non_empty_env("TDFETCH_PHONE") {
            credentials.phone = Some(phone);
        }
        Ok(credentials)
    }

    pub fn load_file(&self) -> Result<Credentials, CredentialsError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Credentials::default()),
            Err(err) => return Err(CredentialsError::Io(err)),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn store(&self, credentials: &ApiCredentials) -> Result<(), CredentialsError> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }

        let file = Credentials {
            api_id: Some(credentials.api_id),
            api_hash: Some(credentials.api_hash.clone()),
            phone: Some(credentials.phone.clone()),
            updated_at: Some(current_epoch_seconds() as i64),
        };
        let payload = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, payload)?;
        set_file_permissions(&self.path, 0o600)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CredentialsError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CredentialsError::Io(err)),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn ensure_dir(path: &Path) -> Result<(), io::Error> {
    fs::create_dir_all(path)?;
    set_dir_permissions(path, 0o700)?;
    Ok(())
}

fn current_epoch_seconds() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(unix)]
fn set_file_permissions(path: &Path, mode: u32) -> Result<(), io::Error> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path, mode: u32) -> Result<(), io::Error> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path, _mode: u32) -> Result<(), io::Error> {
    Ok(())
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path, _mode: u32) -> Result<(), io::Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> Credentials {
        Credentials {
            api_id: Some(21156764),
            api_hash: Some("510953159b9f7d3359fe7a70a5cbf566".to_string()),
            phone: Some("+15550100".to_string()),
            updated_at: None,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir()
            .join(format!("tdfetch-test-{}-{name}", std::process::id()))
            .join("credentials.json")
    }

    #[test]
    fn validation_rejects_missing_and_placeholder_values() {
        assert!(complete().validate().is_ok());

        let mut bad = complete();
        bad.api_id = Some(0);
        assert!(matches!(bad.validate(), Err(CredentialsError::InvalidApiId)));

        let mut bad = complete();
        bad.api_hash = Some(PLACEHOLDER_API_HASH.to_string());
        assert!(matches!(bad.validate(), Err(CredentialsError::InvalidApiHash)));

        let mut bad = complete();
        bad.phone = Some(PLACEHOLDER_PHONE.to_string());
        assert!(matches!(bad.validate(), Err(CredentialsError::InvalidPhone)));

        assert!(matches!(
            Credentials::default().validate(),
            Err(CredentialsError::InvalidApiId)
        ));
    }

    #[test]
    fn masking_keeps_a_short_prefix() {
        let credentials = complete().validate().expect("valid");
        assert_eq!(credentials.masked_api_hash(), format!("51095315{}", "*".repeat(24)));
        assert_eq!(credentials.masked_phone(), "+15******");
    }

    #[test]
    fn store_load_and_clear() {
        let path = temp_path("roundtrip");
        let store = CredentialsStore::new(path.clone());
        assert_eq!(store.load_file().expect("missing file"), Credentials::default());

        let credentials = complete().validate().expect("valid");
        store.store(&credentials).expect("store");
        let loaded = store.load_file().expect("load");
        assert_eq!(loaded.validate().expect("valid"), credentials);
        assert!(loaded.updated_at.is_some());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).expect("metadata").permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        store.clear().expect("clear");
        store.clear().expect("clear twice");
        assert!(!path.exists());
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }
}
