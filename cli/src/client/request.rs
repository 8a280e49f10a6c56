//! Bearer-authenticated request construction.

use http::header::{HeaderName, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use reqwest::{Method, Request};
use serde::Serialize;
use url::Url;

use crate::error::{GraphError, Result};

/// An outbound request: target, method, headers and optional body.
///
/// Carries exactly one `Authorization` header, set by the factory that built it.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub const fn url(&self) -> &Url {
        &self.url
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The `Authorization` header value, if it is valid UTF-8.
    pub fn authorization(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
    }

    /// Adds a header.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidArgument`] for `Authorization`, which only the
    /// factory may set.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Result<Self> {
        if name == AUTHORIZATION {
            return Err(GraphError::InvalidArgument(
                "the Authorization header is managed by the request factory".to_string(),
            ));
        }
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Attaches a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Converts into a `reqwest` request ready to execute.
    pub fn into_request(self) -> Request {
        let mut request = Request::new(self.method, self.url);
        *request.headers_mut() = self.headers;
        if let Some(body) = self.body {
            *request.body_mut() = Some(body.into());
        }
        request
    }
}

/// Builds [`RequestDescriptor`]s against a fixed base URL with the current bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedRequestFactory {
    base_url: String,
    token: String,
}

impl AuthenticatedRequestFactory {
    /// Create a factory for `base_url` holding `token`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidArgument`] if `base_url` is not an absolute URL.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        Url::parse(base_url)
            .map_err(|e| GraphError::InvalidArgument(format!("base URL '{base_url}': {e}")))?;

        Ok(Self {
            base_url: base_url.to_string(),
            token: token.into(),
        })
    }

    /// The token used for the next [`build_request`](Self::build_request).
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Replaces the token for subsequently built requests.
    ///
    /// Descriptors already built keep the token they were built with.
    pub fn update_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    /// Builds a request for `base_url + path_suffix`.
    ///
    /// `path_suffix` is empty or starts with `/` or `?`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidArgument`] for any other suffix, a suffix that does
    /// not form a valid URL, or a token that is not a valid header value.
    pub fn build_request(&self, path_suffix: &str, method: Method) -> Result<RequestDescriptor> {
        if !(path_suffix.is_empty() || path_suffix.starts_with(['/', '?'])) {
            return Err(GraphError::InvalidArgument(format!(
                "path suffix must start with '/' or '?', got '{path_suffix}'"
            )));
        }

        let url = Url::parse(&format!("{}{path_suffix}", self.base_url))
            .map_err(|e| GraphError::InvalidArgument(format!("path suffix '{path_suffix}': {e}")))?;

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| GraphError::InvalidArgument("token is not a valid header value".to_string()))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        Ok(RequestDescriptor {
            method,
            url,
            headers,
            body: None,
        })
    }
}
