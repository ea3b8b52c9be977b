//! Minimal W3C WebDriver client over HTTP.
//!
//! Only the endpoints the fusion steps use are wired up. Every command goes
//! through [`WebDriver::command`], which unwraps the protocol's `{"value": ..}`
//! envelope and turns protocol errors into [`FetchError::WebDriver`].

use super::{Browser, Element, SessionOptions};
use crate::error::{FetchError, Result};
use crate::utils::http::get_user_agent;
use reqwest::Method;
use serde_json::{json, Value};

/// Key the W3C protocol uses for element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// A live WebDriver session.
pub struct WebDriver {
    client: reqwest::Client,
    endpoint: String,
    session_id: String,
}

impl WebDriver {
    /// Create a new session at `endpoint` (for example `http://localhost:4444`).
    pub async fn open(endpoint: &str, options: &SessionOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(get_user_agent())
            .build()
            .map_err(|e| FetchError::WebDriver(format!("failed to build HTTP client: {}", e)))?;
        let endpoint = endpoint.trim_end_matches('/').to_string();

        let response = client
            .post(format!("{}/session", endpoint))
            .json(&options.capabilities())
            .send()
            .await
            .map_err(|e| FetchError::WebDriver(format!("failed to reach {}: {}", endpoint, e)))?;
        let value = unwrap_response(response).await?;

        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| FetchError::WebDriver("new session response has no sessionId".into()))?
            .to_string();
        tracing::debug!(%session_id, "webdriver session opened");

        Ok(Self {
            client,
            endpoint,
            session_id,
        })
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::WebDriver(format!("request to {} failed: {}", url, e)))?;
        unwrap_response(response).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.command(Method::POST, path, Some(body)).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.command(Method::GET, path, None).await
    }
}

/// Strip the `{"value": ..}` envelope, mapping protocol errors.
async fn unwrap_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| FetchError::WebDriver(format!("invalid response ({}): {}", status, e)))?;
    parse_envelope(status.is_success(), body)
}

fn parse_envelope(success: bool, mut body: Value) -> Result<Value> {
    let value = body
        .get_mut("value")
        .map(Value::take)
        .unwrap_or(Value::Null);
    if success {
        return Ok(value);
    }

    let error = value["error"].as_str().unwrap_or("unknown error");
    let message = value["message"].as_str().unwrap_or("");
    Err(FetchError::WebDriver(format!("{}: {}", error, message)))
}

fn element_from(value: &Value) -> Result<Element> {
    value[ELEMENT_KEY]
        .as_str()
        .map(|id| Element(id.to_string()))
        .ok_or_else(|| FetchError::WebDriver("response is not an element reference".into()))
}

impl Browser for WebDriver {
    async fn goto(&self, url: &str) -> Result<()> {
        self.post("/url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn find(&self, selector: &str) -> Result<Element> {
        let value = self
            .post(
                "/element",
                json!({ "using": "css selector", "value": selector }),
            )
            .await?;
        element_from(&value)
    }

    async fn click(&self, element: &Element) -> Result<()> {
        self.post(&format!("/element/{}/click", element.0), json!({}))
            .await?;
        Ok(())
    }

    async fn clear(&self, element: &Element) -> Result<()> {
        self.post(&format!("/element/{}/clear", element.0), json!({}))
            .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &Element, text: &str) -> Result<()> {
        self.post(
            &format!("/element/{}/value", element.0),
            json!({ "text": text }),
        )
        .await?;
        Ok(())
    }

    async fn text(&self, element: &Element) -> Result<String> {
        let value = self.get(&format!("/element/{}/text", element.0)).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn execute(&self, script: &str) -> Result<Value> {
        self.post("/execute/sync", json!({ "script": script, "args": [] }))
            .await
    }

    async fn current_tab(&self) -> Result<String> {
        let value = self.get("/window").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| FetchError::WebDriver("window handle is not a string".into()))
    }

    async fn new_tab(&self) -> Result<String> {
        let value = self.post("/window/new", json!({ "type": "tab" })).await?;
        value["handle"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| FetchError::WebDriver("new window response has no handle".into()))
    }

    async fn switch_to(&self, handle: &str) -> Result<()> {
        self.post("/window", json!({ "handle": handle })).await?;
        Ok(())
    }

    async fn close_tab(&self) -> Result<()> {
        self.command(Method::DELETE, "/window", None).await?;
        Ok(())
    }

    async fn quit(self) -> Result<()> {
        self.command(Method::DELETE, "", None).await?;
        tracing::debug!(session_id = %self.session_id, "webdriver session closed");
        Ok(())
    }
}
