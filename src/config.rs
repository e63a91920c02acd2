use std::env;
use std::path::PathBuf;

use crate::credentials::ApiCredentials;
use crate::td::TdlibParameters;

const DEFAULT_BRIDGE_URL: &str = "ws://127.0.0.1:8765/tdjson";

#[derive(Clone, Debug)]
pub struct Config {
    pub bridge_url: String,
    pub database_dir: PathBuf,
    pub files_dir: PathBuf,
    pub secrets_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let debug = cfg!(debug_assertions);
        let bridge_url = lookup("TDFETCH_BRIDGE_URL").unwrap_or_else(|| DEFAULT_BRIDGE_URL.to_string());
        let bridge_url = bridge_url.trim_end_matches('/').to_string();

        let data_dir = lookup("TDFETCH_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir(debug));
        let database_dir = lookup("TDFETCH_DATABASE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("tdlib"));
        let files_dir = lookup("TDFETCH_FILES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("files"));
        let secrets_path = lookup("TDFETCH_SECRETS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("credentials.json"));

        Self {
            bridge_url,
            database_dir,
            files_dir,
            secrets_path,
        }
    }

    pub fn tdlib_parameters(&self, credentials: &ApiCredentials) -> TdlibParameters {
        let device_model = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "Desktop".to_string());

        TdlibParameters {
            use_test_dc: false,
            database_directory: self.database_dir.to_string_lossy().to_string(),
            files_directory: self.files_dir.to_string_lossy().to_string(),
            database_encryption_key: String::new(),
            use_file_database: false,
            use_chat_info_database: true,
            use_message_database: true,
            use_secret_chats: true,
            api_id: credentials.api_id,
            api_hash: credentials.api_hash.clone(),
            system_language_code: "en".to_string(),
            device_model,
            system_version: env::consts::OS.to_string(),
            application_version: env!("CARGO_PKG_VERSION").to_string(),
            enable_storage_optimizer: true,
        }
    }
}

fn default_data_dir(debug: bool) -> PathBuf {
    let base = env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    let dir_name = if debug { "tdfetch-dev" } else { "tdfetch" };
    base.join(".local").join("share").join(dir_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tdlib_parameters_follow_config_and_credentials() {
        let config = Config {
            bridge_url: DEFAULT_BRIDGE_URL.to_string(),
            database_dir: PathBuf::from("/tmp/tdfetch/tdlib"),
            files_dir: PathBuf::from("/tmp/tdfetch/files"),
            secrets_path: PathBuf::from("/tmp/tdfetch/credentials.json"),
        };
        let credentials = ApiCredentials {
            api_id: 42,
            api_hash: "abc".to_string(),
            phone: "+15550100".to_string(),
        };

        let parameters = config.tdlib_parameters(&credentials);

        assert_eq!(parameters.database_directory, "/tmp/tdfetch/tdlib");
        assert_eq!(parameters.api_id, 42);
        assert_eq!(parameters.api_hash, "abc");
        assert!(parameters.use_message_database);
        assert!(parameters.use_secret_chats);
        assert!(parameters.enable_storage_optimizer);
        assert_eq!(parameters.system_language_code, "en");
        assert!(!parameters.device_model.is_empty());
    }

    #[test]
    fn directories_derive_from_the_data_dir() {
        let config = Config::from_lookup(|name| match name {
            "TDFETCH_DATA_DIR" => Some("/srv/tdfetch".to_string()),
            "TDFETCH_FILES_DIR" => Some("/mnt/media".to_string()),
            "TDFETCH_BRIDGE_URL" => Some("ws://bridge:9000/tdjson/".to_string()),
            _ => None,
        });

        assert_eq!(config.bridge_url, "ws://bridge:9000/tdjson");
        assert_eq!(config.database_dir, PathBuf::from("/srv/tdfetch/tdlib"));
        assert_eq!(config.files_dir, PathBuf::from("/mnt/media"));
        assert_eq!(config.secrets_path, PathBuf::from("/srv/tdfetch/credentials.json"));
    }
}
