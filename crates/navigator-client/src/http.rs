use crate::config::NavigatorClientConfig;
use crate::error::{NavigatorClientError, Result};
use reqwest::header::HeaderValue;
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

const CSRF_HEADER: &str = "X-XSRF-TOKEN";

#[derive(Clone)]
pub(crate) struct HttpClient {
    pub(crate) inner: reqwest::Client,
    pub(crate) base_url: String,
    csrf_token: Option<HeaderValue>,
    request_timeout: Duration,
    health_timeout: Duration,
}

impl HttpClient {
    pub(crate) fn new(config: &NavigatorClientConfig) -> Result<Self> {
        let csrf_token = config
            .csrf_token
            .as_deref()
            .map(|t| {
                let mut value = HeaderValue::from_str(t).map_err(|e| {
                    NavigatorClientError::Config(format!("invalid CSRF token header value: {e}"))
                })?;
                value.set_sensitive(true);
                Ok::<_, NavigatorClientError>(value)
            })
            .transpose()?;

        let inner = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            inner,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            csrf_token,
            request_timeout: config.request_timeout,
            health_timeout: config.health_timeout,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET requests are exempt from the CSRF double-submit; every other verb
    /// carries the token header when one is configured.
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .inner
            .request(method.clone(), self.url(path))
            .timeout(self.request_timeout);
        if method != Method::GET {
            if let Some(token) = &self.csrf_token {
                builder = builder.header(CSRF_HEADER, token.clone());
            }
        }
        builder
    }

    pub(crate) async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let resp = self.request(Method::GET, path).send().await?;
        self.parse(resp).await
    }

    pub(crate) async fn get_with_query<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<R> {
        let resp = self.request(Method::GET, path).query(query).send().await?;
        self.parse(resp).await
    }

    /// GET with a plain-text body; `None` on 204 No Content. Used by the
    /// scalar settings endpoints.
    pub(crate) async fn get_text_optional(&self, path: &str) -> Result<Option<String>> {
        let resp = self.request(Method::GET, path).send().await?;
        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(NavigatorClientError::Unauthorized);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = self.extract_error_message(resp).await;
            return Err(NavigatorClientError::Server { status, message });
        }
        Ok(Some(resp.text().await?))
    }

    pub(crate) async fn health_check<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let resp = self
            .inner
            .get(self.url(path))
            .timeout(self.health_timeout)
            .send()
            .await?;
        self.parse(resp).await
    }

    pub(crate) async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let resp = self.request(Method::POST, path).json(body).send().await?;
        self.parse(resp).await
    }

    pub(crate) async fn post_empty<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let resp = self.request(Method::POST, path).json(body).send().await?;
        self.check_status(resp).await
    }

    pub(crate) async fn post_no_body(&self, path: &str) -> Result<()> {
        let resp = self.request(Method::POST, path).send().await?;
        self.check_status(resp).await
    }

    /// The settings endpoints for scalar values take `text/plain` bodies.
    pub(crate) async fn post_text(&self, path: &str, body: impl Into<String>) -> Result<()> {
        let resp = self
            .request(Method::POST, path)
            .header("Content-Type", "text/plain")
            .body(body.into())
            .send()
            .await?;
        self.check_status(resp).await
    }

    pub(crate) async fn patch_empty<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let resp = self.request(Method::PATCH, path).json(body).send().await?;
        self.check_status(resp).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        let resp = self.request(Method::DELETE, path).send().await?;
        self.check_status(resp).await
    }

    /// POST whose response body is consumed as a byte stream. No request
    /// timeout: a chat stream stays open for as long as the model generates.
    pub(crate) async fn post_streaming<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let mut builder = self.inner.post(self.url(path)).json(body);
        if let Some(token) = &self.csrf_token {
            builder = builder.header(CSRF_HEADER, token.clone());
        }
        let resp = builder.send().await?;
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(NavigatorClientError::Unauthorized);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = self.extract_error_message(resp).await;
            return Err(NavigatorClientError::Server { status, message });
        }
        Ok(resp)
    }

    async fn parse<R: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<R> {
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(NavigatorClientError::Unauthorized);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = self.extract_error_message(resp).await;
            return Err(NavigatorClientError::Server { status, message });
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(NavigatorClientError::Deserialization)
    }

    async fn check_status(&self, resp: reqwest::Response) -> Result<()> {
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(NavigatorClientError::Unauthorized);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = self.extract_error_message(resp).await;
            return Err(NavigatorClientError::Server { status, message });
        }
        Ok(())
    }

    /// Best-effort: the backend reports errors as `{"error": ...}` or
    /// `{"message": ...}`, but some proxies answer with plain text.
    async fn extract_error_message(&self, resp: reqwest::Response) -> String {
        let text = resp
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .or_else(|| v.get("message"))?
                    .as_str()
                    .map(String::from)
            })
            .unwrap_or(text)
    }
}
