//! Azure AI Vision (Image Analysis 4.0) クライアント
//!
//! 1回の呼び出しでキャプション・タグ・物体・OCR(read)を取得する。

use super::{
    build_http_client, trim_endpoint, truncate, ImageData, VisionAnalyzer, ERROR_BODY_MAX_CHARS,
};
use crate::config::{VisionSettings, ENV_VISION_KEY};
use crate::error::{MatchError, Result};
use async_trait::async_trait;
use menu_match_common::types::{BoundingBox, Caption, DetectedObject, Tag, TextLine};
use menu_match_common::VisionAnalysis;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const API_VERSION: &str = "2023-10-01";
const FEATURES: &str = "caption,tags,objects,read";

pub struct AzureVisionClient {
    endpoint: String,
    api_key: String,
    region: String,
    client: reqwest::Client,
}

impl AzureVisionClient {
    pub fn from_settings(settings: &VisionSettings, timeout: Duration) -> Result<Self> {
        let (endpoint, api_key) = match (&settings.endpoint, &settings.api_key) {
            (Some(endpoint), Some(key)) if settings.is_configured() => (endpoint, key),
            _ => {
                return Err(MatchError::MissingCredentials {
                    service: "Azure Vision".into(),
                    env: ENV_VISION_KEY.into(),
                })
            }
        };

        Ok(Self {
            endpoint: trim_endpoint(endpoint).to_string(),
            api_key: api_key.trim().to_string(),
            region: settings.region.clone(),
            client: build_http_client(timeout)?,
        })
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/computervision/imageanalysis:analyze?api-version={}&features={}",
            self.endpoint, API_VERSION, FEATURES
        )
    }
}

#[async_trait]
impl VisionAnalyzer for AzureVisionClient {
    /// エンドポイントとキーが設定されていれば利用可能
    async fn is_available(&self) -> bool {
        !self.endpoint.is_empty() && !self.api_key.is_empty()
    }

    async fn analyze(&self, image: &ImageData) -> Result<VisionAnalysis> {
        debug!(file = %image.file_name, region = %self.region, "Azure Vision 呼び出し");

        let response = self
            .client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.bytes.clone())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MatchError::ApiCall(format!(
                "Azure Vision がエラーを返しました ({}): {}",
                status,
                truncate(&body, ERROR_BODY_MAX_CHARS)
            )));
        }

        parse_analyze_response(&body)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct AnalyzeResponse {
    caption_result: Option<CaptionResult>,
    tags_result: Option<TagsResult>,
    objects_result: Option<ObjectsResult>,
    read_result: Option<ReadResult>,
}

#[derive(Debug, Deserialize)]
struct CaptionResult {
    text: String,
    confidence: f64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TagsResult {
    values: Vec<ApiTag>,
}

#[derive(Debug, Deserialize)]
struct ApiTag {
    name: String,
    confidence: f64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ObjectsResult {
    values: Vec<ApiObject>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ApiObject {
    bounding_box: ApiBoundingBox,
    tags: Vec<ApiTag>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ApiBoundingBox {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ReadResult {
    blocks: Vec<ReadBlock>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ReadBlock {
    lines: Vec<ReadLine>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ReadLine {
    text: String,
    words: Vec<ReadWord>,
}

#[derive(Debug, Deserialize)]
struct ReadWord {
    confidence: f64,
}

/// レスポンスJSONを VisionAnalysis に変換
///
/// OCR行の信頼度は行内の単語信頼度の最大値
fn parse_analyze_response(body: &str) -> Result<VisionAnalysis> {
    let response: AnalyzeResponse = serde_json::from_str(body)
        .map_err(|e| MatchError::ApiParse(format!("Azure Vision レスポンス: {}", e)))?;

    let caption = response.caption_result.map(|c| Caption {
        text: c.text,
        confidence: c.confidence,
    });

    let tags = response
        .tags_result
        .unwrap_or_default()
        .values
        .into_iter()
        .map(|t| Tag {
            name: t.name,
            confidence: t.confidence,
        })
        .collect();

    let objects = response
        .objects_result
        .unwrap_or_default()
        .values
        .into_iter()
        .map(|o| {
            let (name, confidence) = o
                .tags
                .first()
                .map(|t| (t.name.clone(), t.confidence))
                .unwrap_or_else(|| ("unknown".to_string(), 0.0));
            DetectedObject {
                name,
                confidence,
                bounding_box: BoundingBox {
                    x: o.bounding_box.x,
                    y: o.bounding_box.y,
                    w: o.bounding_box.w,
                    h: o.bounding_box.h,
                },
            }
        })
        .collect();

    let text_lines = response
        .read_result
        .unwrap_or_default()
        .blocks
        .into_iter()
        .flat_map(|b| b.lines)
        .map(|line| TextLine {
            confidence: line.words.iter().map(|w| w.confidence).fold(0.0, f64::max),
            text: line.text,
        })
        .collect();

    Ok(VisionAnalysis {
        caption,
        tags,
        objects,
        text_lines,
    })
}
