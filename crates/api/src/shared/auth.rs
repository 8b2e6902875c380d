use crate::error::ReminderError;
use actix_web::HttpRequest;
use event_reminder_infra::ReminderContext;

/// Extracts the credential of a `Bearer <token>` header value. The scheme
/// name is matched case-insensitively and must be followed by whitespace.
fn parse_authtoken_header(token_header_value: &str) -> Option<&str> {
    let mut parts = token_header_value.trim().splitn(2, char::is_whitespace);
    let scheme = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = parts.next()?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Only callers presenting the configured trigger secret as a bearer token
/// are allowed to start a scheduler run
pub fn protect_trigger_route(req: &HttpRequest, ctx: &ReminderContext) -> Result<(), ReminderError> {
    let secret = match &ctx.config.trigger_secret {
        Some(secret) => secret,
        None => {
            return Err(ReminderError::MissingConfig(
                "No trigger secret has been configured".into(),
            ))
        }
    };

    let token = match req.headers().get("authorization") {
        Some(token) => match token.to_str() {
            Ok(token) => parse_authtoken_header(token),
            Err(_) => {
                return Err(ReminderError::Unauthorized(
                    "Malformed authorization header".into(),
                ))
            }
        },
        None => {
            return Err(ReminderError::Unauthorized(
                "Missing bearer credential".into(),
            ))
        }
    };

    let valid = match token {
        Some(token) => constant_time_eq(token, secret),
        None => false,
    };
    if !valid {
        return Err(ReminderError::Unauthorized(
            "Invalid bearer credential".into(),
        ));
    }
    Ok(())
}
