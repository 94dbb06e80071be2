use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tracing::{Dispatch, debug, instrument::WithSubscriber};

use crate::{
    error::{Error, Result, classify_response, classify_transport},
    model::Payload,
    retry::RetryPolicy,
    session::{
        GetRequest, HttpSession, ReqwestSession, ReqwestSessionFactory, SessionFactory,
        TransportError,
    },
};

pub const API_URL: &str = "https://api.openuv.io/api/v1";
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

pub const DEFAULT_PROTECTION_LOW: f64 = 3.5;
pub const DEFAULT_PROTECTION_HIGH: f64 = 3.5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenUV access token. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Per-client settings, fixed at construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: ApiKey,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub base_url: String,
    pub timeout: Duration,
    pub check_status_before_request: bool,
    pub retry: RetryPolicy,
    /// Where debug traces go. `None` uses the process-wide subscriber.
    pub logger: Option<Dispatch>,
}

/// Builder for [`Client`].
#[derive(Debug)]
pub struct ClientBuilder {
    config: ClientConfig,
    retries_enabled: bool,
    session: Option<Arc<dyn HttpSession>>,
    factory: Arc<dyn SessionFactory>,
}

impl ClientBuilder {
    pub fn new(api_key: impl Into<ApiKey>, latitude: f64, longitude: f64) -> Self {
        Self {
            config: ClientConfig {
                api_key: api_key.into(),
                latitude,
                longitude,
                altitude: 0.0,
                base_url: API_URL.to_string(),
                timeout: DEFAULT_TIMEOUT,
                check_status_before_request: false,
                retry: RetryPolicy::default(),
                logger: None,
            },
            retries_enabled: true,
            session: None,
            factory: Arc::new(ReqwestSessionFactory),
        }
    }

    pub fn altitude(mut self, altitude: f64) -> Self {
        self.config.altitude = altitude;
        self
    }

    /// Reuse a caller-owned `reqwest::Client` for every request.
    pub fn http_client(self, http: reqwest::Client) -> Self {
        self.session(Arc::new(ReqwestSession::new(http)))
    }

    /// Reuse a caller-owned session. The client never closes it.
    pub fn session(mut self, session: Arc<dyn HttpSession>) -> Self {
        self.session = Some(session);
        self
    }

    /// Source of per-call sessions used when no session is supplied.
    pub fn session_factory(mut self, factory: Arc<dyn SessionFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn check_status_before_request(mut self, check: bool) -> Self {
        self.config.check_status_before_request = check;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Shorthand for keeping the backoff and changing only the attempt budget.
    pub fn request_retries(mut self, max_attempts: u32) -> Self {
        self.config.retry.max_attempts = max_attempts;
        self
    }

    pub fn retries_enabled(mut self, enabled: bool) -> Self {
        self.retries_enabled = enabled;
        self
    }

    pub fn logger(mut self, logger: impl Into<Dispatch>) -> Self {
        self.config.logger = Some(logger.into());
        self
    }

    pub fn build(self) -> Client {
        Client {
            config: self.config,
            session: self.session,
            factory: self.factory,
            retries_enabled: AtomicBool::new(self.retries_enabled),
        }
    }
}

/// Async client for the OpenUV API.
///
/// Every data operation is a GET against one endpoint with the access token
/// header and the stored location attached. Without a caller-supplied session
/// each call opens its own connection and closes it before returning.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    session: Option<Arc<dyn HttpSession>>,
    factory: Arc<dyn SessionFactory>,
    retries_enabled: AtomicBool,
}

impl Client {
    pub fn new(api_key: impl Into<ApiKey>, latitude: f64, longitude: f64) -> Self {
        ClientBuilder::new(api_key, latitude, longitude).build()
    }

    pub fn builder(api_key: impl Into<ApiKey>, latitude: f64, longitude: f64) -> ClientBuilder {
        ClientBuilder::new(api_key, latitude, longitude)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn enable_request_retries(&self) {
        self.retries_enabled.store(true, Ordering::Release);
    }

    pub fn disable_request_retries(&self) {
        self.retries_enabled.store(false, Ordering::Release);
    }

    pub fn request_retries_enabled(&self) -> bool {
        self.retries_enabled.load(Ordering::Acquire)
    }

    /// Current UV index at the client's location.
    pub async fn uv_index(&self) -> Result<Payload> {
        self.check_api_status_if_required("uv").await?;
        self.request("uv", &[]).await
    }

    /// Hourly UV forecast for the current day.
    pub async fn uv_forecast(&self) -> Result<Payload> {
        self.check_api_status_if_required("forecast").await?;
        self.request("forecast", &[]).await
    }

    /// Window during which the UV index sits between `low` and `high`.
    pub async fn uv_protection_window(&self, low: f64, high: f64) -> Result<Payload> {
        self.check_api_status_if_required("protection").await?;
        self.request(
            "protection",
            &[("from", wire_number(low)), ("to", wire_number(high))],
        )
        .await
    }

    pub async fn uv_protection_window_default(&self) -> Result<Payload> {
        self.uv_protection_window(DEFAULT_PROTECTION_LOW, DEFAULT_PROTECTION_HIGH)
            .await
    }

    /// API usage statistics for the access token.
    pub async fn api_statistics(&self) -> Result<Payload> {
        self.check_api_status_if_required("stat").await?;
        self.request("stat", &[]).await
    }

    /// `true` when the service reports itself as available.
    pub async fn api_status(&self) -> Result<bool> {
        let payload = self.request("status", &[]).await?;
        payload
            .get("status")
            .and_then(|status| status.as_bool())
            .ok_or_else(|| Error::request_failed("status", "response has no boolean `status`"))
    }

    async fn check_api_status_if_required(&self, endpoint: &str) -> Result<()> {
        if !self.config.check_status_before_request || self.api_status().await? {
            return Ok(());
        }

        Err(Error::api_unavailable(endpoint))
    }

    /// Perform a GET against `endpoint` (relative to the API base URL).
    ///
    /// `extra_params` are appended after `lat`, `lng` and `alt`. Transient
    /// failures are retried according to the client's [`RetryPolicy`] while
    /// retries are enabled.
    pub async fn request(&self, endpoint: &str, extra_params: &[(&str, String)]) -> Result<Payload> {
        let call = async {
            if self.request_retries_enabled() {
                self.config
                    .retry
                    .run(endpoint, || self.request_once(endpoint, extra_params))
                    .await
            } else {
                self.request_once(endpoint, extra_params).await
            }
        };

        match &self.config.logger {
            Some(logger) => call.with_subscriber(logger.clone()).await,
            None => call.await,
        }
    }

    async fn request_once(&self, endpoint: &str, extra_params: &[(&str, String)]) -> Result<Payload> {
        let (session, transient) = match &self.session {
            Some(session) if !session.is_closed() => (session.clone(), false),
            _ => {
                let session = self
                    .factory
                    .create(self.config.timeout)
                    .map_err(|err| classify_transport(endpoint, err))?;
                (session, true)
            }
        };

        let outcome = self.exchange(session.as_ref(), endpoint, extra_params).await;

        if transient {
            session.close().await;
        }

        let payload = outcome?;
        debug!(target: "openuv", "Data received for {endpoint}: {}", serde_json::Value::Object(payload.clone()));

        Ok(payload)
    }

    async fn exchange(
        &self,
        session: &dyn HttpSession,
        endpoint: &str,
        extra_params: &[(&str, String)],
    ) -> Result<Payload> {
        let url = format!("{}/{endpoint}", self.config.base_url);
        let query = self.query(extra_params);
        let headers = [(ACCESS_TOKEN_HEADER, self.config.api_key.expose())];

        let request = GetRequest {
            url: &url,
            headers: &headers,
            query: &query,
            timeout: self.config.timeout,
        };

        let raw = match tokio::time::timeout(self.config.timeout, session.get(request)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => return Err(classify_transport(endpoint, err)),
            Err(elapsed) => {
                return Err(classify_transport(
                    endpoint,
                    TransportError::Timeout(Some(Box::new(elapsed))),
                ));
            }
        };

        if let Some(err) = classify_response(endpoint, raw.status, &raw.body) {
            return Err(err);
        }

        serde_json::from_str::<Payload>(&raw.body).map_err(|err| Error::RequestFailed {
            endpoint: endpoint.to_string(),
            message: format!("Error requesting data from {endpoint}: invalid JSON payload ({err})"),
            status: Some(raw.status),
            transient: false,
            source: Some(Box::new(err)),
        })
    }

    fn query(&self, extra_params: &[(&str, String)]) -> Vec<(String, String)> {
        let mut query = vec![
            ("lat".to_string(), wire_number(self.config.latitude)),
            ("lng".to_string(), wire_number(self.config.longitude)),
            ("alt".to_string(), wire_number(self.config.altitude)),
        ];
        query.extend(
            extra_params
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone())),
        );
        query
    }
}

/// Numbers travel as strings; whole numbers keep their `.0` (`0.0`, `3.5`, `1609.3`).
pub(crate) fn wire_number(value: f64) -> String {
    format!("{value:?}")
}
