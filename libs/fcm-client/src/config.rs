use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// FCM Configuration
///
/// Loaded from `FCM_*` environment variables, e.g. `FCM_SERVER_KEY`,
/// `FCM_PROJECT_ID`, `FCM_CREDENTIALS_PATH` and `FCM_TIMEOUT_SECS`.
#[derive(Debug, Clone, Deserialize)]
pub struct FcmConfig {
    /// Legacy server key (`Authorization: key=...`)
    pub server_key: Option<String>,
    /// Firebase project for the v1 endpoint
    pub project_id: Option<String>,
    /// Service account JSON key for v1 token minting
    pub credentials_path: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_uri")]
    pub base_uri: String,
    #[serde(default = "default_base_uri")]
    pub base_uri_v1: String,
    #[serde(default = "default_group_notification_base_uri")]
    pub group_notification_base_uri: String,
    #[serde(default = "default_instance_id_base_uri")]
    pub instance_id_base_uri: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_base_uri() -> String {
    "https://fcm.googleapis.com".to_string()
}

fn default_group_notification_base_uri() -> String {
    "https://android.googleapis.com".to_string()
}

fn default_instance_id_base_uri() -> String {
    "https://iid.googleapis.com".to_string()
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            server_key: None,
            project_id: None,
            credentials_path: None,
            timeout_secs: default_timeout_secs(),
            base_uri: default_base_uri(),
            base_uri_v1: default_base_uri(),
            group_notification_base_uri: default_group_notification_base_uri(),
            instance_id_base_uri: default_instance_id_base_uri(),
        }
    }
}

impl FcmConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::prefixed("FCM_").from_env()
    }

    /// Legacy-only configuration
    pub fn with_server_key(server_key: impl Into<String>) -> Self {
        Self {
            server_key: Some(server_key.into()),
            ..Default::default()
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Point every endpoint family at one host, e.g. a local mock server
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        let base_uri = base_uri.into();
        self.base_uri_v1 = base_uri.clone();
        self.group_notification_base_uri = base_uri.clone();
        self.instance_id_base_uri = base_uri.clone();
        self.base_uri = base_uri;
        self
    }

    pub fn send_url(&self) -> String {
        format!("{}/fcm/send", self.base_uri)
    }

    pub fn send_v1_url(&self, project_id: &str) -> String {
        format!("{}/v1/projects/{}/messages:send", self.base_uri_v1, project_id)
    }

    pub fn group_notification_url(&self) -> String {
        format!("{}/gcm/notification", self.group_notification_base_uri)
    }

    pub fn instance_id_url(&self, path: &str) -> String {
        format!("{}/iid/{}", self.instance_id_base_uri, path)
    }
}
