//! Common API response types

use actix_web::{http::StatusCode, HttpResponse};
use serde::Serialize;

use crate::models::HubError;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Convert HubError to HTTP response
impl From<HubError> for HttpResponse {
    fn from(error: HubError) -> Self {
        let (status, message) = match &error {
            HubError::NoNodesAvailable => (StatusCode::SERVICE_UNAVAILABLE, error.to_string()),
            HubError::NodeRejected(_) => (StatusCode::SERVICE_UNAVAILABLE, error.to_string()),
            HubError::DispatchTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, error.to_string()),
            HubError::NodeLost { .. } => (StatusCode::BAD_GATEWAY, error.to_string()),
            HubError::ConnectionError(_) => (StatusCode::BAD_GATEWAY, error.to_string()),
            HubError::SerializationError(_) => (StatusCode::BAD_REQUEST, error.to_string()),
            HubError::MalformedEnvelope(_) => (StatusCode::BAD_REQUEST, error.to_string()),
            HubError::InvalidBroadcastRecord(_) => (StatusCode::BAD_REQUEST, error.to_string()),
            HubError::ConfigError(_) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
            HubError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
        };

        HttpResponse::build(status).json(ApiResponse::<()>::error(message))
    }
}

/// Result type that can be converted to HttpResponse
pub type ApiResult<T> = Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let response = HttpResponse::from(HubError::NoNodesAvailable);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = HttpResponse::from(HubError::DispatchTimeout { deadline_secs: 120 });
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let response = HttpResponse::from(HubError::node_lost("node-1"));
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
