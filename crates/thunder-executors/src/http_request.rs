//! HTTP callout executor (§4.3): a single outbound request defined by
//! node properties, after placeholder substitution has already run
//! (§4.2 — substitution happens at node entry, before the executor runs).

use async_trait::async_trait;
use std::time::Duration;
use thunder_executor::{Executor, ExecutorContext};
use thunder_model::{ExecutorResult, ThunderError, ThunderResult, Value};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 3;

pub struct HttpRequestExecutor {
    http: reqwest::Client,
}

impl Default for HttpRequestExecutor {
    fn default() -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .expect("reqwest client configuration is static and always valid");
        Self { http }
    }
}

#[async_trait]
impl Executor for HttpRequestExecutor {
    fn name(&self) -> &str {
        "HTTPRequest"
    }

    async fn execute(&self, mut ctx: ExecutorContext) -> ThunderResult<ExecutorResult> {
        let url = ctx
            .properties
            .get_str("url")
            .ok_or_else(|| ThunderError::invalid_request("missing url property"))?
            .to_string();
        let method = ctx
            .properties
            .get_str("method")
            .unwrap_or("GET")
            .to_uppercase();
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| ThunderError::invalid_request("unsupported HTTP method"))?;

        let mut request = self.http.request(method, &url);

        if let Some(Value::Map(headers)) = ctx.properties.get("headers") {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name, value);
                }
            }
        }

        if let Some(body) = ctx.properties.get("body") {
            request = match body {
                Value::Map(_) | Value::List(_) => request.json(&value_to_json(body)),
                Value::String(s) => request.body(s.clone()),
                other => request.json(&value_to_json(other)),
            };
        }

        let response = request
            .send()
            .await
            .map_err(|e| ThunderError::external_request_failed(format!("HTTP callout transport error: {e}")))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), Value::String(v.to_string()))))
            .collect::<std::collections::BTreeMap<_, _>>();
        let is_success = response.status().is_success();
        let body_text = response
            .text()
            .await
            .map_err(|e| ThunderError::external_request_failed(format!("HTTP callout body read error: {e}")))?;

        if !is_success {
            return Ok(ExecutorResult::failed(
                "ExternalRequestFailed",
                format!("HTTP callout returned status {status}"),
            ));
        }

        ctx.sink.write("response_status", Value::Number(status as f64));
        ctx.sink.write("response_headers", Value::Map(headers));
        ctx.sink.write("response_body", Value::String(body_text));
        Ok(thunder_executor::complete_from_sink(ctx.sink))
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Number(n) => serde_json::json!(n),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Bytes(b) => serde_json::Value::String(base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            b,
        )),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
        Value::Null => serde_json::Value::Null,
    }
}
