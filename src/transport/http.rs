//! HTTP transport for model-typed REST calls
//!
//! Request bodies are serialized from [`Instance`]s and responses are
//! deserialized against the model the caller expects.

use crate::model::{Deserializer, DiagnosticsSink, Instance, NoopSink, Registry, Serializer};
use anyhow::{Context, Result};
use reqwest::{Client, Method};
use serde_json::Value;
use url::Url;

/// Maximum length of response body to log
const MAX_LOG_BODY_LENGTH: usize = 200;

static NOOP: NoopSink = NoopSink;

/// Truncate long bodies and strip control characters before logging
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// REST client that speaks registry models
#[derive(Clone)]
pub struct ModelClient<'r> {
    client: Client,
    base_url: Url,
    registry: &'r Registry,
    sink: &'r dyn DiagnosticsSink,
}

impl<'r> ModelClient<'r> {
    pub fn new(base_url: &str, registry: &'r Registry) -> Result<Self> {
        let mut base_url = Url::parse(base_url).with_context(|| format!("Invalid base URL '{}'", base_url))?;
        // Url::join replaces the last segment unless the base ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .user_agent(concat!("cloudmodels/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            registry,
            sink: &NOOP,
        })
    }

    /// Report enum and discriminator fallbacks in responses to `sink`
    pub fn with_sink(mut self, sink: &'r dyn DiagnosticsSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("Invalid request path '{}'", path))?;
        if !query.is_empty() {
            let encoded: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.set_query(Some(&encoded.join("&")));
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Value> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(anyhow::anyhow!("API request failed: {}", status));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).context("Failed to parse response JSON")
    }

    fn decode(&self, raw: &Value, model: &str) -> Result<Instance> {
        Deserializer::new(self.registry)
            .with_sink(self.sink)
            .deserialize_model(raw, model)
            .with_context(|| format!("Failed to decode response as {}", model))
    }

    fn decode_optional(&self, raw: &Value, model: Option<&str>) -> Result<Option<Instance>> {
        match model {
            Some(model) if !raw.is_null() => self.decode(raw, model).map(Some),
            _ => Ok(None),
        }
    }

    fn encode(&self, body: &Instance) -> Result<Value> {
        Serializer::new(self.registry)
            .serialize(body)
            .with_context(|| format!("Failed to encode {} request body", body.model()))
    }

    /// GET `path` and decode the response as `model`
    pub async fn get(&self, path: &str, model: &str) -> Result<Instance> {
        self.get_with_query(path, &[], model).await
    }

    pub async fn get_with_query(&self, path: &str, query: &[(&str, &str)], model: &str) -> Result<Instance> {
        let raw = self.send(Method::GET, self.url(path, query)?, None).await?;
        self.decode(&raw, model)
    }

    /// GET `path` and return the undecoded JSON
    pub async fn get_raw(&self, path: &str) -> Result<Value> {
        self.send(Method::GET, self.url(path, &[])?, None).await
    }

    /// POST `body`; an empty response or `response_model == None` yields `None`
    pub async fn post(&self, path: &str, body: &Instance, response_model: Option<&str>) -> Result<Option<Instance>> {
        let payload = self.encode(body)?;
        let raw = self.send(Method::POST, self.url(path, &[])?, Some(&payload)).await?;
        self.decode_optional(&raw, response_model)
    }

    pub async fn put(&self, path: &str, body: &Instance, response_model: Option<&str>) -> Result<Option<Instance>> {
        let payload = self.encode(body)?;
        let raw = self.send(Method::PUT, self.url(path, &[])?, Some(&payload)).await?;
        self.decode_optional(&raw, response_model)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, self.url(path, &[])?, None).await?;
        Ok(())
    }
}

/// Short user-facing message for a failed request
pub fn format_api_error(error: &anyhow::Error) -> String {
    let error_str = error.to_string();

    if error_str.contains("403") {
        return "Permission denied.".to_string();
    }
    if error_str.contains("401") {
        return "Authentication failed.".to_string();
    }
    if error_str.contains("404") {
        return "Resource not found.".to_string();
    }
    if error_str.contains("409") {
        return "Resource conflict. The resource may already exist or be in use.".to_string();
    }
    if error_str.contains("429") {
        return "Rate limit exceeded. Please try again later.".to_string();
    }
    if error_str.contains("400") {
        return "Invalid request. Check your parameters.".to_string();
    }
    if error_str.contains("500") || error_str.contains("503") {
        return "Service temporarily unavailable. Please try again.".to_string();
    }

    // Decode failures carry a field path worth showing in full
    let chain = format!("{:#}", error);
    if chain.contains("Failed to decode") {
        return chain;
    }

    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(80)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
