use actix_web::HttpRequest;
use log::debug;

use crate::errors::ServerError;

/// Extracts the authenticated user from the `X-User-Id` header.
///
/// Authentication itself happens upstream (a reverse proxy or API gateway strips untrusted values and injects the
/// header); by the time a request reaches these handlers the header is authoritative. A request without it is
/// malformed, not anonymous.
pub fn get_user_id(req: &HttpRequest) -> Result<String, ServerError> {
    let user_id = req
        .headers()
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            debug!("💻️ Request to {} is missing the X-User-Id header", req.path());
            ServerError::InvalidRequestBody("Missing X-User-Id header".to_string())
        })?;
    Ok(user_id.to_string())
}
