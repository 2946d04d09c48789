use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::auth::{DynTokenProvider, ServiceAccountTokenProvider};
use crate::condition;
use crate::config::FcmConfig;
use crate::errors::{FCMError, Result};
use crate::message::{
    self, Audience, NotificationKeyOperation, NotificationKeyRequest, Options, RegistrationIds,
    TopicBatchRequest,
};
use crate::response::{normalize, ResponseRecord};
use crate::transport::{HttpTransport, RawResponse};

/// Firebase Cloud Messaging Client
///
/// Sends through the v1 endpoint (bearer token from a [`TokenProvider`]) and
/// the legacy endpoint (server key). Remote failures come back as a
/// [`ResponseRecord`]; sends that are declined locally, such as an invalid
/// topic condition or an empty id list, return `Ok(None)` without touching
/// the network.
///
/// [`TokenProvider`]: crate::auth::TokenProvider
#[derive(Clone)]
pub struct FCMClient {
    config: Arc<FcmConfig>,
    token_provider: Option<DynTokenProvider>,
    transport: HttpTransport,
}

/// Treat empty credentials as absent
fn normalize_config(mut config: FcmConfig) -> FcmConfig {
    if config.server_key.as_deref().is_some_and(str::is_empty) {
        config.server_key = None;
    }
    if config.project_id.as_deref().is_some_and(str::is_empty) {
        config.project_id = None;
    }
    config
}

fn token_prefix(token: &str) -> String {
    token.chars().take(8).collect()
}

impl FCMClient {
    /// Create new FCM client
    ///
    /// # Arguments
    /// * `config` - server key, project id, endpoints and timeout
    /// * `token_provider` - bearer token source for the v1 endpoint
    ///
    /// At least one of a non-empty server key or a token provider is required.
    pub fn new(config: FcmConfig, token_provider: Option<DynTokenProvider>) -> Result<Self> {
        let config = normalize_config(config);
        let transport = HttpTransport::new(config.timeout())?;
        Self::with_transport(config, token_provider, transport)
    }

    fn with_transport(
        config: FcmConfig,
        token_provider: Option<DynTokenProvider>,
        transport: HttpTransport,
    ) -> Result<Self> {
        if config.server_key.is_none() && token_provider.is_none() {
            return Err(FCMError::Config(
                "either a server key or a token provider is required".to_string(),
            ));
        }

        info!(
            "Initialized FCM client (project={:?}, legacy={}, v1={})",
            config.project_id,
            config.server_key.is_some(),
            token_provider.is_some()
        );

        Ok(Self {
            config: Arc::new(config),
            token_provider,
            transport,
        })
    }

    /// Create a client from configuration alone, loading the service account
    /// key from `credentials_path` when set. The project id defaults to the
    /// one in the key file.
    ///
    /// Token requests reuse the pooled HTTP client of the message transport.
    pub fn from_config(mut config: FcmConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout())?;

        let token_provider = match config.credentials_path.as_ref() {
            Some(path) => {
                let provider = ServiceAccountTokenProvider::from_path(path)?
                    .with_shared_client(transport.http_client().clone());
                if config.project_id.as_deref().map_or(true, str::is_empty) {
                    config.project_id = Some(provider.project_id().to_string());
                }
                Some(Arc::new(provider) as DynTokenProvider)
            }
            None => None,
        };

        Self::with_transport(normalize_config(config), token_provider, transport)
    }

    pub fn config(&self) -> &FcmConfig {
        &self.config
    }

    fn server_key(&self) -> Result<&str> {
        self.config
            .server_key
            .as_deref()
            .ok_or_else(|| FCMError::Config("legacy server key is not configured".to_string()))
    }

    fn legacy_headers(&self) -> Result<Vec<(&'static str, String)>> {
        Ok(vec![("Authorization", format!("key={}", self.server_key()?))])
    }

    // ==================== v1 API ====================

    /// Send a prebuilt message through the v1 endpoint
    pub async fn send_v1(&self, message: Options) -> Result<ResponseRecord> {
        let project_id = self
            .config
            .project_id
            .as_deref()
            .ok_or_else(|| FCMError::Config("project id is required for v1 sends".to_string()))?;
        let provider = self.token_provider.as_ref().ok_or_else(|| {
            FCMError::Config("a token provider is required for v1 sends".to_string())
        })?;

        let access_token = provider.access_token().await?;
        let url = self.config.send_v1_url(project_id);
        let body = message::v1_envelope(message);

        let raw = self
            .transport
            .post_json(
                &url,
                &[("Authorization", format!("Bearer {}", access_token))],
                &body,
            )
            .await?;

        self.finish(raw, None)
    }

    /// Send to a single device
    pub async fn send_to_token(&self, token: &str, options: &Options) -> Result<ResponseRecord> {
        debug!("FCM v1 send to token {}", token_prefix(token));
        let message = message::build(&Audience::Token(token.to_string()), options)?;
        self.send_v1(message).await
    }

    /// Send to every subscriber of a topic
    pub async fn send_to_topic(&self, topic: &str, options: &Options) -> Result<ResponseRecord> {
        debug!("FCM v1 send to topic {}", topic);
        let message = message::build(&Audience::Topic(topic.to_string()), options)?;
        self.send_v1(message).await
    }

    /// Send to a topic condition. Returns `Ok(None)` without sending when the
    /// condition is malformed.
    pub async fn send_to_condition(
        &self,
        condition: &str,
        options: &Options,
    ) -> Result<Option<ResponseRecord>> {
        if let Err(e) = condition::check(condition) {
            warn!("Not sending to invalid FCM condition: {}", e);
            return Ok(None);
        }

        let message = message::build(&Audience::Condition(condition.to_string()), options)?;
        self.send_v1(message).await.map(Some)
    }

    /// Send one message addressed to several device tokens. Returns
    /// `Ok(None)` when `tokens` is empty.
    pub async fn send_to_multiple_devices(
        &self,
        tokens: &[String],
        options: &Options,
    ) -> Result<Option<ResponseRecord>> {
        if tokens.is_empty() {
            debug!("No FCM tokens given, nothing to send");
            return Ok(None);
        }

        let message = message::build(&Audience::Tokens(tokens.to_vec()), options)?;
        self.send_v1(message).await.map(Some)
    }

    // ==================== Legacy API ====================

    /// Legacy multicast send. A single id is sent as a one-element list.
    /// Returns `Ok(None)` when no ids are given.
    ///
    /// The record carries `canonical_ids` and `not_registered_ids`.
    pub async fn send_notification(
        &self,
        registration_ids: impl Into<RegistrationIds>,
        options: &Options,
    ) -> Result<Option<ResponseRecord>> {
        let registration_ids = registration_ids.into();
        let headers = self.legacy_headers()?;
        message::validate_legacy_options(options)?;

        if registration_ids.is_empty() {
            debug!("No FCM registration ids given, nothing to send");
            return Ok(None);
        }

        let body = message::build(&Audience::RegistrationIds(registration_ids.clone()), options)?;
        let raw = self
            .transport
            .post_json(&self.config.send_url(), &headers, &body)
            .await?;

        info!(
            "FCM legacy multicast to {} ids returned {}",
            registration_ids.len(),
            raw.status_code
        );

        self.finish(raw, Some(registration_ids.as_slice())).map(Some)
    }

    /// Legacy send to a notification key, device token or `/topics/...`
    pub async fn send_with_notification_key(
        &self,
        notification_key: &str,
        options: &Options,
    ) -> Result<ResponseRecord> {
        let headers = self.legacy_headers()?;
        message::validate_legacy_options(options)?;

        let body = message::build(&Audience::To(notification_key.to_string()), options)?;
        self.legacy_send(&headers, &body).await
    }

    /// Legacy topic send. Returns `Ok(None)` for an invalid topic name.
    pub async fn send_legacy_to_topic(
        &self,
        topic: &str,
        options: &Options,
    ) -> Result<Option<ResponseRecord>> {
        if !condition::is_valid_topic(topic) {
            warn!("Not sending to invalid FCM topic {:?}", topic);
            return Ok(None);
        }

        self.send_with_notification_key(&message::topic_destination(topic), options)
            .await
            .map(Some)
    }

    /// Legacy condition send. Returns `Ok(None)` for a malformed condition.
    pub async fn send_legacy_to_condition(
        &self,
        condition: &str,
        options: &Options,
    ) -> Result<Option<ResponseRecord>> {
        let headers = self.legacy_headers()?;

        if let Err(e) = condition::check(condition) {
            warn!("Not sending to invalid FCM condition: {}", e);
            return Ok(None);
        }
        message::validate_legacy_options(options)?;

        let body = message::build(&Audience::Condition(condition.to_string()), options)?;
        self.legacy_send(&headers, &body).await.map(Some)
    }

    async fn legacy_send(
        &self,
        headers: &[(&str, String)],
        body: &Options,
    ) -> Result<ResponseRecord> {
        let raw = self
            .transport
            .post_json(&self.config.send_url(), headers, body)
            .await?;
        self.finish(raw, None)
    }

    // ==================== Device groups ====================

    /// Create a device group. `sender_id` is the project's sender id.
    pub async fn create_notification_key(
        &self,
        key_name: &str,
        sender_id: &str,
        registration_ids: impl Into<RegistrationIds>,
    ) -> Result<ResponseRecord> {
        let request = NotificationKeyRequest {
            operation: NotificationKeyOperation::Create,
            notification_key_name: key_name.to_string(),
            notification_key: None,
            registration_ids: registration_ids.into(),
        };
        self.notification_key_operation(sender_id, &request).await
    }

    /// Add devices to an existing group
    pub async fn add_registration_ids(
        &self,
        key_name: &str,
        sender_id: &str,
        notification_key: &str,
        registration_ids: impl Into<RegistrationIds>,
    ) -> Result<ResponseRecord> {
        let request = NotificationKeyRequest {
            operation: NotificationKeyOperation::Add,
            notification_key_name: key_name.to_string(),
            notification_key: Some(notification_key.to_string()),
            registration_ids: registration_ids.into(),
        };
        self.notification_key_operation(sender_id, &request).await
    }

    /// Remove devices from a group
    pub async fn remove_registration_ids(
        &self,
        key_name: &str,
        sender_id: &str,
        notification_key: &str,
        registration_ids: impl Into<RegistrationIds>,
    ) -> Result<ResponseRecord> {
        let request = NotificationKeyRequest {
            operation: NotificationKeyOperation::Remove,
            notification_key_name: key_name.to_string(),
            notification_key: Some(notification_key.to_string()),
            registration_ids: registration_ids.into(),
        };
        self.notification_key_operation(sender_id, &request).await
    }

    /// Look up the notification key of a group by name
    pub async fn recover_notification_key(
        &self,
        key_name: &str,
        sender_id: &str,
    ) -> Result<ResponseRecord> {
        let mut headers = self.legacy_headers()?;
        headers.push(("project_id", sender_id.to_string()));

        let raw = self
            .transport
            .get(
                &self.config.group_notification_url(),
                &headers,
                &[("notification_key_name", key_name)],
            )
            .await?;
        self.finish(raw, None)
    }

    async fn notification_key_operation(
        &self,
        sender_id: &str,
        request: &NotificationKeyRequest,
    ) -> Result<ResponseRecord> {
        let mut headers = self.legacy_headers()?;
        headers.push(("project_id", sender_id.to_string()));

        let raw = self
            .transport
            .post_json(&self.config.group_notification_url(), &headers, request)
            .await?;

        info!(
            "FCM device group {:?} for {} returned {}",
            request.operation, request.notification_key_name, raw.status_code
        );
        self.finish(raw, None)
    }

    // ==================== Instance ID ====================

    /// Subscribe one device to a topic
    pub async fn topic_subscription(
        &self,
        topic: &str,
        registration_id: &str,
    ) -> Result<ResponseRecord> {
        let headers = self.legacy_headers()?;
        let url = self
            .config
            .instance_id_url(&format!("v1/{}/rel/topics/{}", registration_id, topic));

        let raw = self.transport.post_json(&url, &headers, &json!({})).await?;
        self.finish(raw, None)
    }

    /// Subscribe several devices to a topic in one call
    pub async fn batch_topic_subscription(
        &self,
        topic: &str,
        registration_ids: impl Into<RegistrationIds>,
    ) -> Result<ResponseRecord> {
        self.batch_topic_operation("v1:batchAdd", topic, registration_ids.into())
            .await
    }

    /// Unsubscribe several devices from a topic in one call
    pub async fn batch_topic_unsubscription(
        &self,
        topic: &str,
        registration_ids: impl Into<RegistrationIds>,
    ) -> Result<ResponseRecord> {
        self.batch_topic_operation("v1:batchRemove", topic, registration_ids.into())
            .await
    }

    async fn batch_topic_operation(
        &self,
        path: &str,
        topic: &str,
        registration_ids: RegistrationIds,
    ) -> Result<ResponseRecord> {
        let headers = self.legacy_headers()?;
        let request = TopicBatchRequest::new(topic, registration_ids);

        let raw = self
            .transport
            .post_json(&self.config.instance_id_url(path), &headers, &request)
            .await?;
        self.finish(raw, None)
    }

    /// Fetch Instance ID metadata for a token; `details` adds subscriptions
    pub async fn get_instance_id_info(
        &self,
        iid_token: &str,
        details: bool,
    ) -> Result<ResponseRecord> {
        let headers = self.legacy_headers()?;
        let url = self.config.instance_id_url(&format!("info/{}", iid_token));
        let query: &[(&str, &str)] = if details { &[("details", "true")] } else { &[] };

        let raw = self.transport.get(&url, &headers, query).await?;
        self.finish(raw, None)
    }

    fn finish(&self, raw: RawResponse, requested_ids: Option<&[String]>) -> Result<ResponseRecord> {
        if raw.status_code != 200 {
            warn!("FCM request returned status {}", raw.status_code);
        }
        normalize(raw.status_code, raw.headers, raw.body, requested_ids)
    }
}

/// Convert any serializable payload into message options
pub fn to_options<T: Serialize>(value: &T) -> Result<Options> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(FCMError::InvalidOption(
            "message options must be a JSON object".to_string(),
        )),
        Err(e) => Err(FCMError::InvalidOption(e.to_string())),
    }
}
