/// FCM Client Library
///
/// This library provides a Firebase Cloud Messaging (FCM) client for sending
/// push notifications through both the v1 and the legacy HTTP APIs.
///
/// It handles:
/// - Topic condition validation before anything is sent
/// - Message assembly for token, topic, condition and multicast audiences
/// - OAuth2 token generation from Google service accounts, with caching
/// - Response normalization, including canonical id remaps and
///   unregistered device ids from legacy multicast responses
/// - Device group management and Instance ID topic subscriptions
pub mod auth;
pub mod client;
pub mod condition;
pub mod config;
pub mod errors;
pub mod message;
pub mod models;
pub mod response;
pub mod transport;

pub use auth::{ServiceAccountTokenProvider, StaticTokenProvider, TokenProvider};
pub use client::{to_options, FCMClient};
pub use condition::{validate as validate_condition, ConditionError};
pub use config::FcmConfig;
pub use errors::FCMError;
pub use message::{Audience, Options, RegistrationIds};
pub use models::ServiceAccountKey;
pub use response::{CanonicalId, LegacyResultItem, Outcome, ResponseRecord};
