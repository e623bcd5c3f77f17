//! 画像解析サービス
//!
//! - VisionAnalyzer: キャプション・タグ・物体・OCR
//! - LanguageModelAnalyzer: 候補リストを渡して料理を説明させる
//!
//! 1枚ごとに Vision → 言語モデルの順で呼び出し、Visionの結果を
//! 言語モデルのプロンプトに文脈として渡す。

mod azure_openai;
mod azure_vision;

pub use azure_openai::AzureOpenAiClient;
pub use azure_vision::AzureVisionClient;

use crate::config::Config;
use crate::error::{MatchError, Result};
use async_trait::async_trait;
use base64::Engine;
use image::ImageFormat;
use menu_match_common::{
    AnalysisResult, AnalyzerKind, AnalyzerOutput, LanguageModelAnalysis, VisionAnalysis,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 解析対象の画像データ
#[derive(Debug, Clone)]
pub struct ImageData {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ImageData {
    pub fn mime_type(&self) -> &'static str {
        crate::scanner::mime_type(self.format)
    }

    /// base64 data URL
    pub fn to_data_url(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{}", self.mime_type(), encoded)
    }
}

#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// 接続確認
    async fn is_available(&self) -> bool;

    async fn analyze(&self, image: &ImageData) -> Result<VisionAnalysis>;
}

#[async_trait]
pub trait LanguageModelAnalyzer: Send + Sync {
    /// 接続確認（簡単な問い合わせが成功するか）
    async fn is_available(&self) -> bool;

    /// # Arguments
    /// * `candidates` - メニュー候補（プロンプトには先頭100件まで）
    /// * `vision` - 同じ画像のVision結果（あれば文脈として付加）
    async fn analyze(
        &self,
        image: &ImageData,
        candidates: &[String],
        vision: Option<&VisionAnalysis>,
    ) -> Result<LanguageModelAnalysis>;
}

/// 今回の実行で使う解析サービスの組
#[derive(Default)]
pub struct AnalyzerSet {
    pub vision: Option<Box<dyn VisionAnalyzer>>,
    pub language_model: Option<Box<dyn LanguageModelAnalyzer>>,
}

impl AnalyzerSet {
    /// 設定からAzureクライアントを生成
    ///
    /// 認証情報のないサービスは警告して除外する。
    /// 有効なサービスが1つも残らず、認証情報不足が原因ならそのエラーを返す。
    pub fn from_config(config: &Config, use_vision: bool, use_openai: bool) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let mut set = AnalyzerSet::default();
        let mut missing = None;

        if use_vision {
            match AzureVisionClient::from_settings(&config.vision, timeout) {
                Ok(client) => set.vision = Some(Box::new(client)),
                Err(err @ MatchError::MissingCredentials { .. }) => {
                    warn!("{}", err);
                    missing = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        if use_openai {
            match AzureOpenAiClient::from_settings(&config.openai, timeout) {
                Ok(client) => set.language_model = Some(Box::new(client)),
                Err(err @ MatchError::MissingCredentials { .. }) => {
                    warn!("{}", err);
                    missing = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        match missing {
            Some(err) if set.enabled_kinds().is_empty() => Err(err),
            _ => Ok(set),
        }
    }

    pub fn enabled_kinds(&self) -> Vec<AnalyzerKind> {
        let mut kinds = Vec::new();
        if self.vision.is_some() {
            kinds.push(AnalyzerKind::Vision);
        }
        if self.language_model.is_some() {
            kinds.push(AnalyzerKind::LanguageModel);
        }
        kinds
    }

    /// 接続確認を行い、利用できないサービスを外す
    pub async fn check_availability(&mut self) -> Vec<(AnalyzerKind, bool)> {
        let mut report = Vec::new();

        if let Some(vision) = &self.vision {
            let available = vision.is_available().await;
            report.push((AnalyzerKind::Vision, available));
            if !available {
                warn!("Azure Vision が利用できません。このサービスは使用しません");
                self.vision = None;
            }
        }

        if let Some(model) = &self.language_model {
            let available = model.is_available().await;
            report.push((AnalyzerKind::LanguageModel, available));
            if !available {
                warn!("Azure OpenAI が利用できません。このサービスは使用しません");
                self.language_model = None;
            }
        }

        report
    }

    /// 1枚の画像を解析（サービス単位の失敗は Failed として返す）
    pub async fn analyze(&self, image: &ImageData, candidates: &[String]) -> AnalysisResult {
        let vision = match &self.vision {
            None => AnalyzerOutput::Disabled,
            Some(analyzer) => match analyzer.analyze(image).await {
                Ok(result) => {
                    debug!(
                        file = %image.file_name,
                        tags = result.tags.len(),
                        objects = result.objects.len(),
                        lines = result.text_lines.len(),
                        "Vision解析完了"
                    );
                    AnalyzerOutput::Completed(result)
                }
                Err(err) => {
                    warn!(file = %image.file_name, "Vision解析に失敗: {}", err);
                    AnalyzerOutput::Failed(err.to_string())
                }
            },
        };

        let language_model = match &self.language_model {
            None => AnalyzerOutput::Disabled,
            Some(analyzer) => match analyzer.analyze(image, candidates, vision.completed()).await {
                Ok(result) => {
                    debug!(
                        file = %image.file_name,
                        guess = ?result.guessed_match,
                        confidence = ?result.confidence,
                        "言語モデル解析完了"
                    );
                    AnalyzerOutput::Completed(result)
                }
                Err(err) => {
                    warn!(file = %image.file_name, "言語モデル解析に失敗: {}", err);
                    AnalyzerOutput::Failed(err.to_string())
                }
            },
        };

        info!(file = %image.file_name, "解析完了");
        AnalysisResult {
            vision,
            language_model,
        }
    }
}

/// タイムアウト付きHTTPクライアント
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| MatchError::Config(format!("HTTPクライアントの初期化に失敗: {}", e)))
}

/// エンドポイント末尾のスラッシュを除去
pub(crate) fn trim_endpoint(endpoint: &str) -> &str {
    endpoint.trim().trim_end_matches('/')
}

/// エラーメッセージに含めるレスポンス本文の最大文字数
pub(crate) const ERROR_BODY_MAX_CHARS: usize = 300;

/// 長いレスポンス本文を切り詰める
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}
