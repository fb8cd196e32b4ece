use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

pub const USER_ID_HEADER: &str = "user-id";

/// Raw value of the `user-id` header, if any. Validation happens together
/// with the rest of the request so the error ordering stays consistent.
#[derive(Debug, Clone, Default)]
pub struct UserIdHeader(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for UserIdHeader
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(UserIdHeader(value))
    }
}

impl UserIdHeader {
    /// Prefers an explicit form field over the header.
    pub fn or_form(self, form_value: Option<String>) -> Option<String> {
        form_value.filter(|v| !v.trim().is_empty()).or(self.0)
    }
}
