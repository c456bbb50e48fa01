use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::NavConfig;

pub const SPARK_CHAT_URL: &str = "https://spark-api-open.xf-yun.com/v1/chat/completions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub content: String,
    #[serde(default)]
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranslateResponse {
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct Translator {
    client: reqwest::Client,
    spark_url: String,
}

impl Translator {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_spark_url(SPARK_CHAT_URL)
    }

    pub fn with_spark_url(spark_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("build translate http client")?;
        Ok(Self {
            client,
            spark_url: spark_url.into(),
        })
    }

    /// Uses the Spark API when a key is configured, otherwise forwards the
    /// request to the configured upstream translate endpoint.
    pub async fn translate(
        &self,
        config: &NavConfig,
        request: &TranslateRequest,
    ) -> anyhow::Result<Value> {
        if let Some(token) = config.xf_api_password.as_deref().filter(|t| !t.trim().is_empty()) {
            let content = self.spark(token.trim(), request).await?;
            return Ok(serde_json::to_value(TranslateResponse { content })?);
        }

        let Some(upstream) = config
            .translate_proxy_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        else {
            anyhow::bail!("translation is not configured (set XFAPIPassword or translateProxyUrl)");
        };

        let resp = self
            .client
            .post(upstream)
            .json(request)
            .send()
            .await
            .with_context(|| format!("POST {upstream}"))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("translate upstream failed ({status}): {body}");
        }
        resp.json().await.context("parse translate upstream json")
    }

    async fn spark(&self, token: &str, request: &TranslateRequest) -> anyhow::Result<String> {
        let body = json!({
            "model": "lite",
            "messages": [{"role": "user", "content": prompt(request)}],
            "stream": false,
        });
        let resp = self
            .client
            .post(&self.spark_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .context("request spark chat completion")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("spark chat completion failed ({status}): {body}");
        }
        let value: Value = resp.json().await.context("parse spark json")?;
        value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("spark response has no message content"))
    }
}

fn prompt(request: &TranslateRequest) -> String {
    let target = if request.language == "zh-CN" {
        "中文"
    } else {
        "英文"
    };
    format!(
        "{} 翻译{target}，直接返回翻译的内容，如果不能翻译返回原内容",
        request.content
    )
}
