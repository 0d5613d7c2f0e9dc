use url::Url;

use thiserror::Error;

/// An error raised by an [`HttpClient`] before a response was received.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The underlying client could not be configured.
    #[error("failed to build http client: {0}")]
    Build(String),
    /// Connecting, sending or reading failed.
    #[error("http request failed: {0}")]
    Request(String),
    /// An IO error of the underlying connection.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// An error reported by reqwest.
    #[cfg(feature = "reqwest")]
    #[cfg_attr(doc_cfg, doc(cfg(feature = "reqwest")))]
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

/// An outgoing envelope `POST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Where to send the request.
    pub url: Url,
    /// Request headers in the order they should be sent.
    pub headers: Vec<(String, String)>,
    /// The envelope bytes.
    pub body: Vec<u8>,
}

/// A received response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Response {
    /// Creates a response.
    pub fn new(status: u16, headers: Vec<(String, String)>, body: String) -> Self {
        Response {
            status,
            headers,
            body,
        }
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Looks up a header value, ignoring the case of its name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The response body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Whether the status is in the `2xx` range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The error message of a rejected request, if the server sent one.
    pub fn error_message(&self) -> Option<&str> {
        if self.is_success() {
            return None;
        }
        let body = self.body.trim();
        (!body.is_empty()).then_some(body)
    }
}

/// Performs blocking HTTP requests for the [`HttpTransport`](super::HttpTransport).
///
/// Retries and connection pooling, if any, are the business of the
/// implementation.
pub trait HttpClient: Send + Sync + 'static {
    /// Sends the request and waits for the response.
    fn send_request(&self, request: &Request) -> Result<Response, HttpClientError>;
}

impl<F> HttpClient for F
where
    F: Fn(&Request) -> Result<Response, HttpClientError> + Send + Sync + 'static,
{
    fn send_request(&self, request: &Request) -> Result<Response, HttpClientError> {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_ignores_case() {
        let response = Response::new(
            429,
            vec![("Retry-After".into(), "60".into())],
            " quota exceeded\n".into(),
        );
        assert_eq!(response.header("retry-after"), Some("60"));
        assert_eq!(response.header("x-sentry-rate-limits"), None);
        assert_eq!(response.error_message(), Some("quota exceeded"));
        assert!(!response.is_success());
        assert_eq!(Response::new(200, vec![], "ok".into()).error_message(), None);
    }
}
