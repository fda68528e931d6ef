use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use blob_store::BlobError;
use tracing::{debug, error};

pub const NOT_FOUND_MESSAGE: &str = "File not found";

/// A failed request, answered with a status code and a plain-text message.
#[derive(Debug)]
pub struct ProxyAPIError {
    status_code: StatusCode,
    message: String,
}

impl ProxyAPIError {
    pub fn new(status_code: StatusCode, message: &str) -> Self {
        Self {
            status_code,
            message: message.to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
    }

    pub fn bad_gateway(e: &BlobError) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, &e.to_string())
    }

    pub fn method_not_allowed(method: &Method) -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            &format!("Method '{}' is not supported", method),
        )
    }
}

#[cfg(test)]
impl ProxyAPIError {
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ProxyAPIError {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            error!("API Error: {} - {}", self.status_code, self.message);
        } else {
            debug!("API Error: {} - {}", self.status_code, self.message);
        }
        (self.status_code, self.message).into_response()
    }
}

impl From<BlobError> for ProxyAPIError {
    fn from(e: BlobError) -> Self {
        if e.is_not_found() {
            return Self::not_found();
        }
        Self::bad_gateway(&e)
    }
}
