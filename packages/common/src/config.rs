use std::path::PathBuf;

use serde::Deserialize;

/// App-level blob storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageAppConfig {
    /// Root of the blob tree. Default: "./storage".
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Largest accepted upload in bytes. Default: 128 MiB.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
    /// Prefix joined with a blob's storage location to form its public URL.
    /// Default: "/media/".
    #[serde(default = "default_public_url_prefix")]
    pub public_url_prefix: String,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./storage")
}
fn default_max_upload_size() -> u64 {
    128 * 1024 * 1024
}
fn default_public_url_prefix() -> String {
    "/media/".into()
}

impl StorageAppConfig {
    /// Public URL of a blob stored at `storage_location`.
    pub fn public_url(&self, storage_location: &str) -> String {
        let prefix = self.public_url_prefix.trim_end_matches('/');
        let location = storage_location.trim_start_matches('/');
        format!("{prefix}/{location}")
    }
}

impl Default for StorageAppConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            max_upload_size: default_max_upload_size(),
            public_url_prefix: default_public_url_prefix(),
        }
    }
}
