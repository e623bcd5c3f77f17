//! 解析結果の型定義
//!
//! CLIとテストで共有される型:
//! - VisionAnalysis: Vision API（OCR・タグ）の出力
//! - LanguageModelAnalysis: 言語モデルの出力（説明・信頼度・推定メニュー）
//! - AnalysisResult: 1枚の画像に対する両サービスの結果
//! - MatchOutcome: 照合の最終結果

use serde::{Deserialize, Serialize};

/// 解析サービスの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalyzerKind {
    #[serde(rename = "azure_vision")]
    Vision,
    #[serde(rename = "openai")]
    LanguageModel,
}

impl std::fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyzerKind::Vision => write!(f, "azure_vision"),
            AnalyzerKind::LanguageModel => write!(f, "openai"),
        }
    }
}

/// 解析サービス1つ分の出力
///
/// 無効化されたサービスと、有効だが今回の画像で失敗したサービスを区別する。
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzerOutput<T> {
    /// 今回の実行では使用しない
    Disabled,
    /// 呼び出しに失敗（理由付き）
    Failed(String),
    /// 解析完了
    Completed(T),
}

impl<T> AnalyzerOutput<T> {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AnalyzerOutput::Disabled)
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            AnalyzerOutput::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            AnalyzerOutput::Failed(reason) => Some(reason.as_str()),
            _ => None,
        }
    }
}

impl<T> Default for AnalyzerOutput<T> {
    fn default() -> Self {
        AnalyzerOutput::Disabled
    }
}

/// キャプション
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Caption {
    pub text: String,
    pub confidence: f64,
}

/// タグ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tag {
    pub name: String,
    pub confidence: f64,
}

/// 矩形（ピクセル単位）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

/// 検出オブジェクト
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectedObject {
    pub name: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

/// OCRで読み取った1行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextLine {
    pub text: String,
    pub confidence: f64,
}

/// Vision APIの解析結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisionAnalysis {
    pub caption: Option<Caption>,
    pub tags: Vec<Tag>,
    pub objects: Vec<DetectedObject>,
    pub text_lines: Vec<TextLine>,
}

impl VisionAnalysis {
    /// 信頼度が閾値以上のOCR行
    pub fn ocr_lines(&self, min_confidence: f64) -> Vec<&str> {
        self.text_lines
            .iter()
            .filter(|line| line.confidence >= min_confidence)
            .map(|line| line.text.trim())
            .filter(|text| !text.is_empty())
            .collect()
    }

    /// 信頼度が閾値以上の食品関連タグ
    pub fn food_tags(&self, min_confidence: f64) -> Vec<&str> {
        self.tags
            .iter()
            .filter(|tag| tag.confidence >= min_confidence)
            .map(|tag| tag.name.as_str())
            .filter(|name| crate::prompts::is_food_tag(name))
            .collect()
    }

    pub fn caption_text(&self) -> Option<&str> {
        self.caption
            .as_ref()
            .map(|c| c.text.trim())
            .filter(|text| !text.is_empty())
    }
}

/// 言語モデルの解析結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LanguageModelAnalysis {
    /// 自由記述（タグ行を除いた本文）
    pub description: String,
    /// 信頼度（1〜10）
    pub confidence: Option<u8>,
    /// 推定メニュー名（候補にあるとは限らない）
    pub guessed_match: Option<String>,
    /// UNMATCHED指定時の略称（大文字）
    pub unmatched_label: Option<String>,
    /// モデル自身が読み取ったテキスト
    pub detected_text: Option<String>,
    /// 生レスポンス
    pub raw_response: String,
}

impl LanguageModelAnalysis {
    /// 信頼度を0.0〜1.0に正規化
    pub fn normalized_confidence(&self) -> Option<f64> {
        self.confidence
            .filter(|&c| c > 0)
            .map(|c| f64::from(c.min(10)) / 10.0)
    }

    pub fn is_explicit_unmatched(&self) -> bool {
        self.unmatched_label.is_some()
    }
}

/// 1枚の画像に対する解析結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResult {
    pub vision: AnalyzerOutput<VisionAnalysis>,
    pub language_model: AnalyzerOutput<LanguageModelAnalysis>,
}

impl AnalysisResult {
    /// 有効なサービス
    pub fn enabled_analyzers(&self) -> Vec<AnalyzerKind> {
        let mut kinds = Vec::new();
        if self.vision.is_enabled() {
            kinds.push(AnalyzerKind::Vision);
        }
        if self.language_model.is_enabled() {
            kinds.push(AnalyzerKind::LanguageModel);
        }
        kinds
    }

    /// 解析に成功したサービス
    pub fn completed_analyzers(&self) -> Vec<AnalyzerKind> {
        let mut kinds = Vec::new();
        if self.vision.completed().is_some() {
            kinds.push(AnalyzerKind::Vision);
        }
        if self.language_model.completed().is_some() {
            kinds.push(AnalyzerKind::LanguageModel);
        }
        kinds
    }
}

/// 照合先
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MatchedItem {
    /// 候補リストのメニュー
    Candidate { description: String },
    /// 該当なし（言語モデルがUNMATCHEDを返した場合はその略称）
    Unknown { label: Option<String> },
}

impl MatchedItem {
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn is_unknown(&self) -> bool {
        matches!(self, MatchedItem::Unknown { .. })
    }

    /// レポート表示用のメニュー名
    pub fn description(&self) -> &str {
        match self {
            MatchedItem::Candidate { description } => description,
            MatchedItem::Unknown { .. } => Self::UNKNOWN,
        }
    }

    pub fn unmatched_label(&self) -> Option<&str> {
        match self {
            MatchedItem::Unknown { label } => label.as_deref(),
            MatchedItem::Candidate { .. } => None,
        }
    }
}

/// 照合に採用したルール
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRule {
    /// OCRテキストとの直接一致
    OcrDirect,
    /// 言語モデルの推定が候補と一致
    LanguageModelGuess,
    /// 単語一致スコア最大の候補
    WordOverlap,
    /// 該当なし
    #[default]
    None,
}

/// OCRテキストの取得元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrSource {
    Vision,
    LanguageModel,
}

/// どのシグナルが照合に寄与したか
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSignals {
    pub rule: SelectionRule,
    pub ocr_direct_match: bool,
    pub ocr_source: Option<OcrSource>,
    pub word_overlap_winner: Option<String>,
    pub word_overlap_score: f64,
    pub llm_confidence: Option<f64>,
    pub llm_guess_matched: bool,
    pub llm_explicit_unmatched: bool,
    pub vision_choice: Option<String>,
    pub llm_choice: Option<String>,
    pub synergy_applied: bool,
    pub synergy_boost: f64,
    pub base_confidence: f64,
    pub analyzers: Vec<AnalyzerKind>,
}

/// 照合結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    pub matched: MatchedItem,
    pub confidence: f64,
    pub signals: MatchSignals,
}

impl MatchOutcome {
    /// 該当なし
    pub fn unknown(label: Option<String>, confidence: f64, signals: MatchSignals) -> Self {
        Self {
            matched: MatchedItem::Unknown { label },
            confidence,
            signals,
        }
    }

    /// 信頼度をパーセント（切り捨て）で返す
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).floor() as u32
    }
}
