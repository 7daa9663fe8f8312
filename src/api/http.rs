use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use super::transport::{ApiRequest, ApiResponse, ApiTransport, Method, TransportError};
use crate::infra::{config::ApiConfig, error::AppError};

/// `reqwest` transport driven on a private current-thread runtime.
///
/// Each call is bounded by the configured timeout; expiry surfaces as
/// [`TransportError::Timeout`].
pub struct HttpTransport {
    runtime: Runtime,
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, AppError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(AppError::Runtime)?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("chatsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| AppError::ConfigInvalid {
                details: format!("failed to build http client: {error}"),
            })?;

        Ok(Self {
            runtime,
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            access_token: config.access_token.clone(),
            timeout: config.timeout(),
        })
    }

    fn build(&self, request: &ApiRequest) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .client
            .request(map_method(request.method), url)
            .query(&request.query);

        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder
    }
}

impl ApiTransport for HttpTransport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let builder = self.build(request);
        let timeout = self.timeout;

        self.runtime.block_on(async move {
            let exchange = async {
                let response = builder.send().await.map_err(map_reqwest_error)?;
                let status = response.status().as_u16();
                let body = response.text().await.map_err(map_reqwest_error)?;
                Ok::<_, TransportError>(ApiResponse { status, body })
            };

            tokio::time::timeout(timeout, exchange)
                .await
                .unwrap_or(Err(TransportError::Timeout))
        })
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("authorized", &self.access_token.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn map_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}
