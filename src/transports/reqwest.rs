use ::reqwest::blocking::Client as ReqwestClient;
use ::reqwest::Proxy;

use super::{HttpClient, HttpClientError, Request, Response};
use crate::ClientOptions;

/// An [`HttpClient`] backed by the blocking [`reqwest`] client.
///
/// When the `transport` feature is enabled this is what the default
/// transport factory sends envelopes with.  The client honors the proxy,
/// timeout and user agent settings of the [`ClientOptions`].
///
/// [`reqwest`]: https://crates.io/crates/reqwest
#[cfg_attr(doc_cfg, doc(cfg(feature = "reqwest")))]
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: ReqwestClient,
}

#[cfg_attr(doc_cfg, doc(cfg(feature = "reqwest")))]
impl ReqwestHttpClient {
    /// Builds a client configured from `options`.
    pub fn new(options: &ClientOptions) -> Result<Self, HttpClientError> {
        let mut builder = ReqwestClient::builder()
            .timeout(options.http_timeout)
            .user_agent(&*options.user_agent);
        if let Some(url) = options.http_proxy.as_deref() {
            builder = builder.proxy(Proxy::http(url)?);
        }
        if let Some(url) = options.https_proxy.as_deref() {
            builder = builder.proxy(Proxy::https(url)?);
        }
        Ok(Self::with_client(builder.build()?))
    }

    /// Wraps an already configured [`ReqwestClient`].
    pub fn with_client(client: ReqwestClient) -> Self {
        ReqwestHttpClient { client }
    }
}

#[cfg_attr(doc_cfg, doc(cfg(feature = "reqwest")))]
impl HttpClient for ReqwestHttpClient {
    fn send_request(&self, request: &Request) -> Result<Response, HttpClientError> {
        let mut builder = self.client.post(request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.body(request.body.clone()).send()?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_owned(), value.to_owned()))
            })
            .collect();
        let body = match response.text() {
            Ok(text) => text,
            Err(err) => {
                sentry_debug!("Failed to read sentry response: {}", err);
                String::new()
            }
        };
        sentry_debug!("Get response: `{}`", body);

        Ok(Response::new(status, headers, body))
    }
}
