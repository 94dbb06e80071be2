//! Transport seam between the client and the network.
//!
//! The client only needs a handful of capabilities from HTTP: issue a GET,
//! bound it by a timeout, read status and body, and optionally keep one
//! long-lived session around. [`HttpSession`] captures exactly that so the
//! executor can be exercised without a network.

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use reqwest::StatusCode;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Status and body of a completed exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Failure before a response could be read.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout(#[source] Option<BoxError>),
    #[error("{0}")]
    Other(#[source] BoxError),
    /// The request could not be issued at all (bad header value, bad URL,
    /// closed session). Repeating it cannot help.
    #[error("{0}")]
    Invalid(#[source] BoxError),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(Some(Box::new(err)))
        } else if err.is_builder() {
            TransportError::Invalid(Box::new(err))
        } else {
            TransportError::Other(Box::new(err))
        }
    }
}

#[derive(Debug, Clone)]
pub struct GetRequest<'a> {
    pub url: &'a str,
    pub headers: &'a [(&'a str, &'a str)],
    pub query: &'a [(String, String)],
    pub timeout: Duration,
}

#[async_trait]
pub trait HttpSession: Send + Sync + Debug {
    async fn get(&self, request: GetRequest<'_>) -> Result<RawResponse, TransportError>;

    fn is_closed(&self) -> bool {
        false
    }

    /// Release the session. Further requests must not be issued afterwards.
    async fn close(&self) {}
}

/// Produces the per-call sessions used when no external session is supplied.
pub trait SessionFactory: Send + Sync + Debug {
    fn create(&self, timeout: Duration) -> Result<Arc<dyn HttpSession>, TransportError>;
}

/// [`HttpSession`] over a `reqwest::Client`.
#[derive(Debug)]
pub struct ReqwestSession {
    http: reqwest::Client,
    closed: AtomicBool,
}

impl ReqwestSession {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            closed: AtomicBool::new(false),
        }
    }

    /// A fresh client whose every request is bounded by `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new(http))
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.http
    }
}

impl From<reqwest::Client> for ReqwestSession {
    fn from(http: reqwest::Client) -> Self {
        Self::new(http)
    }
}

#[async_trait]
impl HttpSession for ReqwestSession {
    async fn get(&self, request: GetRequest<'_>) -> Result<RawResponse, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Invalid("session is closed".into()));
        }

        let mut builder = self
            .http
            .get(request.url)
            .query(request.query)
            .timeout(request.timeout);
        for (name, value) in request.headers {
            builder = builder.header(*name, *value);
        }

        let res = builder.send().await?;
        let status = res.status();
        let body = res.text().await?;

        Ok(RawResponse { status, body })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) {
        // reqwest tears the pool down on drop; the flag guards against reuse.
        self.closed.store(true, Ordering::Release);
    }
}

/// Default factory: one `reqwest::Client` per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestSessionFactory;

impl SessionFactory for ReqwestSessionFactory {
    fn create(&self, timeout: Duration) -> Result<Arc<dyn HttpSession>, TransportError> {
        Ok(Arc::new(ReqwestSession::with_timeout(timeout)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_sends_headers_and_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/uv")
            .match_header("x-access-token", "12345")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("lat".into(), "1.5".into()),
                mockito::Matcher::UrlEncoded("lng".into(), "-2".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"result":{}}"#)
            .create_async()
            .await;

        let session = ReqwestSession::new(reqwest::Client::new());
        let url = format!("{}/uv", server.url());
        let query = vec![
            ("lat".to_string(), "1.5".to_string()),
            ("lng".to_string(), "-2".to_string()),
        ];
        let res = session
            .get(GetRequest {
                url: &url,
                headers: &[("x-access-token", "12345")],
                query: &query,
                timeout: Duration::from_secs(5),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body, r#"{"result":{}}"#);
    }

    #[tokio::test]
    async fn closed_session_refuses_requests() {
        let session = ReqwestSession::new(reqwest::Client::new());
        session.close().await;
        assert!(session.is_closed());

        let err = session
            .get(GetRequest {
                url: "http://127.0.0.1:9/",
                headers: &[],
                query: &[],
                timeout: Duration::from_secs(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Invalid(_)));
    }

    #[tokio::test]
    async fn unencodable_header_is_invalid_not_transport() {
        let session = ReqwestSession::new(reqwest::Client::new());

        let err = session
            .get(GetRequest {
                url: "http://127.0.0.1:9/uv",
                headers: &[("x-access-token", "bad\nkey")],
                query: &[],
                timeout: Duration::from_secs(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Invalid(_)));
    }

    #[test]
    fn factory_builds_open_sessions() {
        let session = ReqwestSessionFactory.create(Duration::from_secs(30)).unwrap();
        assert!(!session.is_closed());
    }
}
