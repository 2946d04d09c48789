use thiserror::Error;

/// FCM Client Error Types
///
/// Remote API failures (4xx/5xx) are not errors: they come back as a
/// [`ResponseRecord`](crate::response::ResponseRecord) carrying the status code.
#[derive(Error, Debug)]
pub enum FCMError {
    #[error("FCM configuration error: {0}")]
    Config(String),

    #[error("Failed to read service account credentials: {0}")]
    Credentials(String),

    #[error("Failed to parse private key: {0}")]
    KeyParse(String),

    #[error("Failed to encode JWT: {0}")]
    JwtEncode(String),

    #[error("Failed to get access token: {0}")]
    Token(String),

    #[error("Token request failed with status: {0} - {1}")]
    TokenRequestFailed(u16, String),

    #[error("{0}")]
    InvalidOption(String),

    #[error("Audience key `{0}` conflicts with the message audience")]
    AudienceConflict(String),

    #[error("FCM request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to parse FCM response: {0}")]
    ResponseParse(String),
}

impl From<FCMError> for String {
    fn from(err: FCMError) -> Self {
        err.to_string()
    }
}

pub type Result<T> = std::result::Result<T, FCMError>;
