use crate::config::AppConfig;
use crate::error::ClientKeyError;
use http::header::AUTHORIZATION;
use rustc_hash::FxHashSet;

/// Compact key index used in hot-path authentication.
pub enum AllowedClientKeys {
    /// No keys configured: every request is accepted.
    Empty,
    Single { raw: Box<str>, bearer: Box<str> },
    Multiple(FxHashSet<String>),
}

impl AllowedClientKeys {
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, AllowedClientKeys::Empty)
    }
}

/// Extract the bearer key from an `Authorization` header value.
///
/// Accepts `Bearer` followed by one or more whitespace characters and a
/// non-empty key.
///
/// # Errors
///
/// Returns [`ClientKeyError::BadFormat`] when the value is not a bearer credential.
pub fn parse_bearer(value: &str) -> Result<&str, ClientKeyError> {
    let rest = value.strip_prefix("Bearer").ok_or(ClientKeyError::BadFormat)?;
    if !rest.starts_with(char::is_whitespace) {
        return Err(ClientKeyError::BadFormat);
    }
    let key = rest.trim_start();
    if key.is_empty() {
        return Err(ClientKeyError::BadFormat);
    }
    Ok(key)
}

/// Extract the client API key from `Authorization: Bearer <key>`.
///
/// # Errors
///
/// Returns [`ClientKeyError::Missing`] when the header is absent and
/// [`ClientKeyError::BadFormat`] when it is not a bearer credential.
pub fn extract_api_key(headers: &http::HeaderMap) -> Result<&str, ClientKeyError> {
    let value = headers.get(AUTHORIZATION).ok_or(ClientKeyError::Missing)?;
    let value = value.to_str().map_err(|_| ClientKeyError::BadFormat)?;
    parse_bearer(value)
}

/// Authenticate a client request against the pre-indexed `allowed_keys`.
///
/// # Errors
///
/// Returns the [`ClientKeyError`] describing why the key was rejected.
pub fn authenticate(
    headers: &http::HeaderMap,
    allowed_keys: &AllowedClientKeys,
) -> Result<(), ClientKeyError> {
    match allowed_keys {
        AllowedClientKeys::Empty => Ok(()),
        AllowedClientKeys::Single { raw, bearer } => {
            let value = headers.get(AUTHORIZATION).ok_or(ClientKeyError::Missing)?;
            // Fast path: exact `Bearer <key>` bytes.
            if value.as_bytes() == bearer.as_bytes() {
                return Ok(());
            }
            let key = value
                .to_str()
                .map_err(|_| ClientKeyError::BadFormat)
                .and_then(parse_bearer)?;
            if key == raw.as_ref() {
                Ok(())
            } else {
                Err(ClientKeyError::Invalid)
            }
        }
        AllowedClientKeys::Multiple(allowed_set) => {
            let client_key = extract_api_key(headers)?;
            if allowed_set.contains(client_key) {
                Ok(())
            } else {
                Err(ClientKeyError::Invalid)
            }
        }
    }
}

/// Build a hash-set index for allowed client keys.
#[must_use]
pub fn build_allowed_key_set(config: &AppConfig) -> AllowedClientKeys {
    let mut allowed_set: FxHashSet<String> = config
        .client_authentication
        .allowed_keys
        .iter()
        .cloned()
        .collect();

    match allowed_set.len() {
        0 => AllowedClientKeys::Empty,
        1 => match allowed_set.drain().next() {
            Some(single_key) => AllowedClientKeys::Single {
                bearer: format!("Bearer {single_key}").into_boxed_str(),
                raw: single_key.into_boxed_str(),
            },
            None => AllowedClientKeys::Empty,
        },
        _ => AllowedClientKeys::Multiple(allowed_set),
    }
}
