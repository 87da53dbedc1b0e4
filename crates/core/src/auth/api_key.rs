//! API key authentication.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};
use crate::config::ApiKeyEntry;

/// Authenticator that maps configured API keys to user names.
///
/// Accepts the key in either:
/// - `Authorization: Bearer <key>` header
/// - `X-API-Key: <key>` header
pub struct ApiKeyAuthenticator {
    keys: Vec<ApiKeyEntry>,
}

impl ApiKeyAuthenticator {
    pub fn new(keys: Vec<ApiKeyEntry>) -> Result<Self, AuthError> {
        if keys.is_empty() {
            return Err(AuthError::ConfigurationError(
                "at least one api key must be configured for api_key auth".to_string(),
            ));
        }
        if let Some(entry) = keys.iter().find(|e| e.key.is_empty() || e.user.is_empty()) {
            return Err(AuthError::ConfigurationError(format!(
                "api key entry for '{}' has an empty user or key",
                entry.user
            )));
        }
        Ok(Self { keys })
    }

    fn extract_key<'a>(&self, request: &'a AuthRequest) -> Option<&'a str> {
        if let Some(header) = request.header("authorization") {
            let key = header
                .strip_prefix("Bearer ")
                .or_else(|| header.strip_prefix("bearer "));
            if key.is_some() {
                return key.map(str::trim);
            }
        }
        request.header("x-api-key").map(str::trim)
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let provided = self.extract_key(request).ok_or(AuthError::NotAuthenticated)?;

        // Compare against every entry so timing does not reveal which matched.
        let matched = self.keys.iter().fold(None, |found, entry| {
            if constant_time_eq(provided.as_bytes(), entry.key.as_bytes()) {
                Some(entry)
            } else {
                found
            }
        });

        match matched {
            Some(entry) => Ok(Identity::new(entry.user.clone(), "api_key")),
            None => Err(AuthError::InvalidCredentials("Invalid API key".to_string())),
        }
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

/// Constant-time byte comparison.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
