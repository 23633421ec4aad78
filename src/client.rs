use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION},
    Client, Response, StatusCode, Url,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    config::{Config, Range},
    error::{QueryRunnerError, Result},
    prometheus::{decode_body, ApiData, ApiError, QueryResult, TargetsResult},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The two calls a run makes against the server.
#[async_trait]
pub trait Api: Send + Sync {
    async fn query_range(&self, query: &str, range: &Range) -> Result<ApiData<QueryResult>>;

    async fn targets(&self) -> Result<ApiData<TargetsResult>>;
}

#[derive(Debug, Clone)]
pub struct PrometheusClient {
    base: Url,
    client: Client,
}

impl PrometheusClient {
    pub fn new(config: &Config) -> Result<Self> {
        let base = parse_base_url(&config.url)?;
        let client =
            create_client(config).map_err(|e| QueryRunnerError::Connection(e.to_string()))?;
        Ok(PrometheusClient { base, client })
    }

    fn endpoint(&self, path: &str) -> Url {
        endpoint_url(&self.base, path)
    }

    async fn decode<T: DeserializeOwned>(
        response: Response,
    ) -> std::result::Result<ApiData<T>, String> {
        let status = response.status();
        let body = response.text().await.map_err(|e| e.to_string())?;
        decode_body(status, &body).map_err(|e: ApiError| e.to_string())
    }
}

#[async_trait]
impl Api for PrometheusClient {
    async fn query_range(&self, query: &str, range: &Range) -> Result<ApiData<QueryResult>> {
        let url = self.endpoint("api/v1/query_range");
        let params = range.query_params(query);
        let query_err = |e: reqwest::Error| QueryRunnerError::Query(e.to_string());

        let mut response = self
            .client
            .post(url.clone())
            .form(&params)
            .send()
            .await
            .map_err(query_err)?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            debug!(%url, "POST not allowed, retrying as GET");
            response = self
                .client
                .get(url)
                .query(&params)
                .send()
                .await
                .map_err(query_err)?;
        }

        Self::decode(response).await.map_err(QueryRunnerError::Query)
    }

    async fn targets(&self) -> Result<ApiData<TargetsResult>> {
        let response = self
            .client
            .get(self.endpoint("api/v1/targets"))
            .send()
            .await
            .map_err(|e| QueryRunnerError::Targets(e.to_string()))?;
        Self::decode(response).await.map_err(QueryRunnerError::Targets)
    }
}

fn parse_base_url(url: &str) -> Result<Url> {
    let base = Url::parse(url)
        .map_err(|e| QueryRunnerError::Connection(format!("invalid url {url:?}: {e}")))?;
    match base.scheme() {
        "http" | "https" => Ok(base),
        scheme => Err(QueryRunnerError::Connection(format!(
            "unsupported scheme {scheme:?} in {url:?}"
        ))),
    }
}

/// Appends `path` to the base url's own path so servers mounted under a prefix work.
fn endpoint_url(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url
}

pub fn create_client(config: &Config) -> std::result::Result<Client, ClientError> {
    let mut headers = HeaderMap::new();
    headers.append(ACCEPT, HeaderValue::from_static("application/json"));
    if let Some(token) = &config.auth_token {
        let mut value = HeaderValue::from_str(token).map_err(|_| ClientError::InvalidToken)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    let client = reqwest::ClientBuilder::new()
        .default_headers(headers)
        .danger_accept_invalid_certs(config.insecure_tls)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(config.timeout);
    Ok(client.build()?)
}

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("token is not a valid header value")]
    InvalidToken,
    #[error(transparent)]
    Build(#[from] reqwest::Error),
}
