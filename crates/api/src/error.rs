use actix_web::{http::StatusCode, HttpResponse};
use event_reminder_api_structs::ErrorResponse;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Internal server error")]
    InternalError,
    #[error("The service is not configured to accept this request. Error message: `{0}`")]
    MissingConfig(String),
    #[error("Unauthorized request. Error message: `{0}`")]
    Unauthorized(String),
}

impl actix_web::error::ResponseError for ReminderError {
    fn status_code(&self) -> StatusCode {
        match *self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.to_string()))
    }
}
