//! Azure OpenAI (chat completions + 画像入力) クライアント

use super::{
    build_http_client, trim_endpoint, truncate, ImageData, LanguageModelAnalyzer,
    ERROR_BODY_MAX_CHARS,
};
use crate::config::{OpenAiSettings, ENV_OPENAI_API_KEY};
use crate::error::{MatchError, Result};
use async_trait::async_trait;
use menu_match_common::{
    build_system_prompt, build_user_prompt, parse_language_model_response, LanguageModelAnalysis,
    VisionAnalysis,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub struct AzureOpenAiClient {
    endpoint: String,
    api_key: String,
    api_version: String,
    deployment: String,
    client: reqwest::Client,
}

impl AzureOpenAiClient {
    pub fn from_settings(settings: &OpenAiSettings, timeout: Duration) -> Result<Self> {
        let (endpoint, api_key) = match (&settings.endpoint, &settings.api_key) {
            (Some(endpoint), Some(key)) if settings.is_configured() => (endpoint, key),
            _ => {
                return Err(MatchError::MissingCredentials {
                    service: "Azure OpenAI".into(),
                    env: ENV_OPENAI_API_KEY.into(),
                })
            }
        };

        Ok(Self {
            endpoint: trim_endpoint(endpoint).to_string(),
            api_key: api_key.trim().to_string(),
            api_version: settings.api_version.clone(),
            deployment: settings.deployment.clone(),
            client: build_http_client(timeout)?,
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    /// チャット補完を呼び出し、最初の選択肢の本文を返す
    async fn complete(&self, messages: Value) -> Result<String> {
        let body = json!({ "messages": messages });

        let response = self
            .client
            .post(self.completions_url())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(MatchError::ApiCall(format!(
                "Azure OpenAI がエラーを返しました ({}): {}",
                status,
                truncate(&text, ERROR_BODY_MAX_CHARS)
            )));
        }

        extract_message_content(&text)
    }
}

#[async_trait]
impl LanguageModelAnalyzer for AzureOpenAiClient {
    async fn is_available(&self) -> bool {
        let messages = json!([
            { "role": "system", "content": "You are a helpful assistant." },
            { "role": "user", "content": "Say hello world." }
        ]);

        match self.complete(messages).await {
            Ok(reply) => {
                debug!(deployment = %self.deployment, reply = %reply, "Azure OpenAI 接続確認OK");
                true
            }
            Err(err) => {
                warn!(deployment = %self.deployment, "Azure OpenAI 接続確認に失敗: {}", err);
                false
            }
        }
    }

    async fn analyze(
        &self,
        image: &ImageData,
        candidates: &[String],
        vision: Option<&VisionAnalysis>,
    ) -> Result<LanguageModelAnalysis> {
        debug!(file = %image.file_name, candidates = candidates.len(), with_vision = vision.is_some(), "Azure OpenAI 呼び出し");

        let messages = build_messages(image, candidates, vision);
        let content = self.complete(messages).await?;

        debug!(file = %image.file_name, chars = content.len(), "Azure OpenAI 応答受信");
        Ok(parse_language_model_response(&content)?)
    }
}

/// システムプロンプトと、テキスト+画像のユーザーメッセージ
fn build_messages(image: &ImageData, candidates: &[String], vision: Option<&VisionAnalysis>) -> Value {
    json!([
        { "role": "system", "content": build_system_prompt() },
        {
            "role": "user",
            "content": [
                { "type": "text", "text": build_user_prompt(candidates, vision) },
                { "type": "image_url", "image_url": { "url": image.to_data_url() } }
            ]
        }
    ])
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

fn extract_message_content(body: &str) -> Result<String> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| MatchError::ApiParse(format!("Azure OpenAI レスポンス: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| MatchError::ApiParse("Azure OpenAI の応答が空です".into()))
}
