use serde::{Deserialize, Serialize};

/// Message used when a transport failure carries no text of its own
pub const FALLBACK_ERROR_MESSAGE: &str = "An error occurred";

/// Outcome of a lookup.
///
/// Failures are ordinary values. Serialization is untagged so cached entries
/// hold exactly `{error_status, error_message}`, `{message}` or the provider
/// payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeolocationResult {
    Provider(ProviderError),
    Transport(TransportError),
    Location(serde_json::Value),
}

/// Non-success HTTP response from the provider
///
/// `error_message` is the body's `message` member as sent, so a non-string
/// message keeps its JSON type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderError {
    pub error_status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<serde_json::Value>,
}

/// Network or decoding failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: if message.is_empty() {
                FALLBACK_ERROR_MESSAGE.to_string()
            } else {
                message
            },
        }
    }
}

impl GeolocationResult {
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Location(_))
    }
}
