//! Logging endpoint transport.

use crate::base::ConsentError;
use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::Full;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use url::Url;

/// One-shot JSON POST to the consent logging endpoint.
///
/// Returns the response status; everything else about the response is
/// irrelevant to the dispatcher. A trait so tests and embedders can
/// substitute their own transport.
pub trait LogTransport: Send + Sync {
    fn post_json(
        &self,
        endpoint: Url,
        body: String,
        prefer_minimal: bool,
    ) -> BoxFuture<'static, Result<u16, ConsentError>>;
}

/// Default transport on the hyper client stack. Plain HTTP: the logging
/// endpoint sits behind the page's reverse proxy, which terminates TLS.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HyperTransport {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LogTransport for HyperTransport {
    fn post_json(
        &self,
        endpoint: Url,
        body: String,
        prefer_minimal: bool,
    ) -> BoxFuture<'static, Result<u16, ConsentError>> {
        let client = self.client.clone();

        Box::pin(async move {
            let uri: http::Uri = endpoint
                .as_str()
                .parse()
                .map_err(|_| ConsentError::invalid_endpoint(endpoint.as_str()))?;

            let mut request = http::Request::builder()
                .method(http::Method::POST)
                .uri(uri)
                .header(http::header::CONTENT_TYPE, "application/json");
            if prefer_minimal {
                request = request.header("Prefer", "return=minimal");
            }

            let request = request
                .body(Full::new(Bytes::from(body)))
                .map_err(|e| ConsentError::transport(e.to_string()))?;

            let response = client
                .request(request)
                .await
                .map_err(|e| ConsentError::transport(e.to_string()))?;

            Ok(response.status().as_u16())
        })
    }
}
