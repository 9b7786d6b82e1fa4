//! Caller authentication
//!
//! Requests carry `Authorization: Bearer <key>`. Two kinds of key are
//! accepted:
//!
//! - `server.auth.user_keys`: one key per user. The caller *is* that user,
//!   and any `user_id` in the request body is ignored.
//! - `server.auth.api_key`: a shared service key for a trusted front end,
//!   which may name the user in the body.
//!
//! The middleware stores the resolved [`Caller`] as a request extension.

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use stack_advisor_config::{AuthConfig, Settings};

static AUTH_DISABLED_WARNED: AtomicBool = AtomicBool::new(false);

/// Who is making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// Auth disabled or public path
    Anonymous,
    /// Holder of the shared service key
    Service,
    /// Holder of a per-user key
    User(String),
}

impl Caller {
    /// User id to record for this request.
    ///
    /// A per-user key always wins over whatever the body claims.
    pub fn user_id(&self, claimed: Option<String>) -> Option<String> {
        match self {
            Caller::User(id) => {
                if claimed.as_deref().is_some_and(|c| c != id) {
                    tracing::debug!(user_id = %id, "Ignoring user_id claimed in request body");
                }
                Some(id.clone())
            }
            Caller::Anonymous | Caller::Service => claimed,
        }
    }
}

/// Why a request was refused
#[derive(Debug, PartialEq, Eq)]
pub enum AuthRejection {
    MissingHeader,
    MalformedHeader,
    UnknownKey,
    /// Auth is on but no key is configured
    NotConfigured,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthRejection::MissingHeader => (StatusCode::UNAUTHORIZED, "Missing Authorization header"),
            AuthRejection::MalformedHeader => (
                StatusCode::BAD_REQUEST,
                "Invalid Authorization header format. Expected: Bearer <token>",
            ),
            AuthRejection::UnknownKey => (StatusCode::UNAUTHORIZED, "Invalid API key"),
            AuthRejection::NotConfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server authentication not configured",
            ),
        };
        (status, message).into_response()
    }
}

/// Resolve the caller for `path` given the raw `Authorization` header.
pub fn authenticate(
    auth: &AuthConfig,
    path: &str,
    authorization: Option<&str>,
) -> Result<Caller, AuthRejection> {
    if !auth.enabled || auth.public_paths.iter().any(|p| p == path) {
        return Ok(Caller::Anonymous);
    }
    if !auth.has_keys() {
        return Err(AuthRejection::NotConfigured);
    }

    let header = authorization.ok_or(AuthRejection::MissingHeader)?;
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthRejection::MalformedHeader)?;

    // Every configured key is compared so timing does not reveal which matched
    let mut caller = None;
    for (user_id, key) in &auth.user_keys {
        if keys_match(token, key) && caller.is_none() {
            caller = Some(Caller::User(user_id.clone()));
        }
    }
    if let Some(key) = auth.api_key.as_deref().filter(|k| !k.is_empty()) {
        if keys_match(token, key) && caller.is_none() {
            caller = Some(Caller::Service);
        }
    }
    caller.ok_or(AuthRejection::UnknownKey)
}

/// Length check, then a branch-free byte comparison
fn keys_match(provided: &str, expected: &str) -> bool {
    let (provided, expected) = (provided.as_bytes(), expected.as_bytes());
    provided.len() == expected.len()
        && provided
            .iter()
            .zip(expected)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

/// Authenticate the request and attach its [`Caller`].
///
/// Key: `STACK_ADVISOR__SERVER__AUTH__API_KEY` or
/// `STACK_ADVISOR__SERVER__AUTH__USER_KEYS__<user_id>`.
/// Enable: `STACK_ADVISOR__SERVER__AUTH__ENABLED=true`.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let Some(config) = request.extensions().get::<Arc<RwLock<Settings>>>().cloned() else {
        tracing::error!("Config extension not found in request");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error").into_response();
    };

    // Resolve before awaiting so the config guard is not held across it
    let path = request.uri().path().to_string();
    let resolved = {
        let settings = config.read();
        if !settings.server.auth.enabled && !AUTH_DISABLED_WARNED.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "API authentication is DISABLED. Set STACK_ADVISOR__SERVER__AUTH__ENABLED=true for production."
            );
        }
        let authorization = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        authenticate(&settings.server.auth, &path, authorization)
    };

    match resolved {
        Ok(caller) => {
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Err(rejection) => {
            match rejection {
                AuthRejection::NotConfigured => {
                    tracing::error!("Auth is enabled but no API key is configured")
                }
                _ => tracing::warn!(path = %path, reason = ?rejection, "Request rejected"),
            }
            rejection.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(api_key: Option<&str>, users: &[(&str, &str)]) -> AuthConfig {
        let mut auth = AuthConfig {
            enabled: true,
            api_key: api_key.map(str::to_string),
            ..AuthConfig::default()
        };
        for (user, key) in users {
            auth.user_keys.insert(user.to_string(), key.to_string());
        }
        auth
    }

    #[test]
    fn test_keys_match() {
        assert!(keys_match("secret", "secret"));
        assert!(!keys_match("secret", "secre"));
        assert!(!keys_match("secret", "secreT"));
        assert!(!keys_match("", "x"));
    }

    #[test]
    fn test_disabled_auth_is_anonymous() {
        let config = AuthConfig::default();
        assert_eq!(authenticate(&config, "/api/chats", None), Ok(Caller::Anonymous));
    }

    #[test]
    fn test_public_paths_match_exactly() {
        let config = auth(Some("k"), &[]);
        assert_eq!(authenticate(&config, "/health", None), Ok(Caller::Anonymous));
        assert_eq!(
            authenticate(&config, "/healthz", None),
            Err(AuthRejection::MissingHeader)
        );
        assert_eq!(
            authenticate(&config, "/health/../api/chats", None),
            Err(AuthRejection::MissingHeader)
        );
    }

    #[test]
    fn test_key_resolution() {
        let config = auth(Some("service-key"), &[("alice", "alice-key"), ("bob", "bob-key")]);
        assert_eq!(
            authenticate(&config, "/api/chats", Some("Bearer alice-key")),
            Ok(Caller::User("alice".to_string()))
        );
        assert_eq!(
            authenticate(&config, "/api/chats", Some("Bearer service-key")),
            Ok(Caller::Service)
        );
        assert_eq!(
            authenticate(&config, "/api/chats", Some("Bearer nope")),
            Err(AuthRejection::UnknownKey)
        );
        assert_eq!(
            authenticate(&config, "/api/chats", Some("Basic alice-key")),
            Err(AuthRejection::MalformedHeader)
        );
        assert_eq!(
            authenticate(&config, "/api/chats", Some("Bearer ")),
            Err(AuthRejection::MalformedHeader)
        );
    }

    #[test]
    fn test_empty_key_is_not_configured() {
        let config = auth(Some(""), &[]);
        assert_eq!(
            authenticate(&config, "/api/chats", Some("Bearer ")),
            Err(AuthRejection::NotConfigured)
        );
    }

    #[test]
    fn test_user_key_overrides_claimed_id() {
        let alice = Caller::User("alice".to_string());
        assert_eq!(alice.user_id(Some("mallory".to_string())), Some("alice".to_string()));
        assert_eq!(alice.user_id(None), Some("alice".to_string()));
        assert_eq!(Caller::Service.user_id(Some("u1".to_string())), Some("u1".to_string()));
        assert_eq!(Caller::Anonymous.user_id(None), None);
    }
}
