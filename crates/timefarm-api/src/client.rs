//! HTTP client for the Time Farm backend
//!
//! One `ApiClient` per account: the optional proxy is fixed when the client is
//! built, so every call an account makes leaves through the same exit. The
//! browser-like header set is installed as default headers; the bearer token
//! is added per call.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ORIGIN};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::constants::{BROWSER_HEADERS, Endpoint, PLATFORM, USER_AGENT};
use crate::error::{Error, Result};
use crate::types::{AccessToken, Balance, FarmInfo, ValidateInitRequest, ValidateInitResponse};
use crate::{ApiFuture, FarmApi};

/// Backend client bound to one base URL and one (optional) proxy.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client. A blank `proxy` means a direct connection.
    pub fn new(base_url: &str, proxy: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .default_headers(default_headers())
            .user_agent(USER_AGENT)
            .timeout(timeout);

        if let Some(proxy) = proxy.map(str::trim).filter(|p| !p.is_empty()) {
            // The proxy URL may carry credentials; keep it out of the error
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| Error::Proxy(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let http = builder.build().map_err(|e| Error::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, endpoint: Endpoint, token: Option<&AccessToken>) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let request = self.http.request(endpoint.method(), url);
        match token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }

    /// `POST /api/v1/auth/validate-init/v2`
    pub async fn get_access_token(&self, init_data: &str) -> Result<AccessToken> {
        let endpoint = Endpoint::ValidateInit;
        let request = self.request(endpoint, None).json(&ValidateInitRequest {
            init_data,
            platform: PLATFORM,
        });
        let body = send(endpoint, request).await?;
        let response: ValidateInitResponse = decode(endpoint, &body)?;

        if response.token.is_empty() {
            return Err(Error::Decode {
                endpoint,
                message: "empty token".into(),
            });
        }
        Ok(AccessToken::new(response.token))
    }

    /// `GET /api/v1/farming/info`
    pub async fn get_farm_info(&self, token: &AccessToken) -> Result<FarmInfo> {
        let endpoint = Endpoint::FarmingInfo;
        let body = send(endpoint, self.request(endpoint, Some(token))).await?;
        decode(endpoint, &body)
    }

    /// `GET /api/v1/balance`
    pub async fn get_balance(&self, token: &AccessToken) -> Result<Balance> {
        let endpoint = Endpoint::Balance;
        let body = send(endpoint, self.request(endpoint, Some(token))).await?;
        decode(endpoint, &body)
    }

    /// `POST /api/v1/balance`
    pub async fn claim_farming(&self, token: &AccessToken) -> Result<Option<Balance>> {
        let endpoint = Endpoint::Claim;
        let request = self
            .request(endpoint, Some(token))
            .json(&serde_json::json!({}));
        let body = send(endpoint, request).await?;
        decode_optional(endpoint, &body)
    }

    /// `POST /api/v1/farming/start`
    pub async fn start_farming(&self, token: &AccessToken) -> Result<FarmInfo> {
        let endpoint = Endpoint::StartFarming;
        let request = self
            .request(endpoint, Some(token))
            .json(&serde_json::json!({}));
        let body = send(endpoint, request).await?;
        Ok(decode_optional(endpoint, &body)?.unwrap_or_default())
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    for &(name, value) in BROWSER_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers.insert(ORIGIN, HeaderValue::from_static(crate::constants::ORIGIN));
    headers
}

/// Send a request and return the body of a 2xx response.
async fn send(endpoint: Endpoint, request: reqwest::RequestBuilder) -> Result<String> {
    let response = request.send().await.map_err(|e| Error::Http {
        endpoint,
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Status {
            endpoint,
            status: status.as_u16(),
            body,
        });
    }

    debug!(%endpoint, status = status.as_u16(), "backend call succeeded");

    response.text().await.map_err(|e| Error::Http {
        endpoint,
        message: format!("reading body: {e}"),
    })
}

fn decode<T: DeserializeOwned>(endpoint: Endpoint, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::Decode {
        endpoint,
        message: e.to_string(),
    })
}

/// Empty and `null` bodies decode to `None`.
fn decode_optional<T: DeserializeOwned>(endpoint: Endpoint, body: &str) -> Result<Option<T>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    decode(endpoint, body)
}

impl FarmApi for ApiClient {
    fn access_token<'a>(&'a self, init_data: &'a str) -> ApiFuture<'a, AccessToken> {
        Box::pin(self.get_access_token(init_data))
    }

    fn farm_info<'a>(&'a self, token: &'a AccessToken) -> ApiFuture<'a, FarmInfo> {
        Box::pin(self.get_farm_info(token))
    }

    fn balance<'a>(&'a self, token: &'a AccessToken) -> ApiFuture<'a, Balance> {
        Box::pin(self.get_balance(token))
    }

    fn claim_farming<'a>(&'a self, token: &'a AccessToken) -> ApiFuture<'a, Option<Balance>> {
        Box::pin(ApiClient::claim_farming(self, token))
    }

    fn start_farming<'a>(&'a self, token: &'a AccessToken) -> ApiFuture<'a, FarmInfo> {
        Box::pin(ApiClient::start_farming(self, token))
    }
}
