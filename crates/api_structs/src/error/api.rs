use serde::{Deserialize, Serialize};

/// Body of every non 200 response
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new<T: Into<String>>(error: T) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}
