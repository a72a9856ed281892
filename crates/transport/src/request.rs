//! Request descriptors and outgoing header assembly.

use memochat_types::{Credential, Result, TransportError};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

/// Everything a domain call supplies besides the endpoint path.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// Caller overrides merged over the transport defaults.
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            body: None,
            query: Vec::new(),
        }
    }

    #[must_use]
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    #[must_use]
    pub fn post(body: Value) -> Self {
        Self::new(Method::POST).with_body(body)
    }

    #[must_use]
    pub fn put(body: Value) -> Self {
        Self::new(Method::PUT).with_body(body)
    }

    #[must_use]
    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a query parameter. `None` values are skipped so optional
    /// filters can be passed straight through.
    #[must_use]
    pub fn with_query(mut self, key: &str, value: Option<impl ToString>) -> Self {
        if let Some(v) = value {
            self.query.push((key.to_string(), v.to_string()));
        }
        self
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

/// Builds the outgoing header set.
///
/// Order matters: the JSON content type goes in first, caller overrides are
/// merged over it (so a caller-supplied `Content-Type` wins), and the bearer
/// credential is applied last (so the transport always owns `Authorization`
/// while a credential is held).
///
/// # Errors
///
/// Returns [`TransportError::Request`] if the credential is not a valid
/// header value.
pub fn merge_headers(overrides: &HeaderMap, credential: Option<&Credential>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.extend(overrides.clone());
    if let Some(credential) = credential {
        let mut value = HeaderValue::from_str(&credential.bearer())
            .map_err(|e| TransportError::Request(format!("invalid credential: {e}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}
