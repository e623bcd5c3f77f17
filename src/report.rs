//! 実行レポート（results.json）

use crate::error::Result;
use crate::scanner::ImageInfo;
use menu_match_common::{AnalyzerKind, MatchOutcome, MatchSignals};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const REPORT_FILE_NAME: &str = "results.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Matched,
    Unknown,
    Failed,
}

/// 画像1枚分の記録
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub source_file: String,
    pub source_path: String,
    pub taken_at: Option<String>,
    pub status: RecordStatus,
    pub matched_description: Option<String>,
    pub unmatched_label: Option<String>,
    pub confidence: f64,
    pub confidence_percent: u32,
    pub signals: Option<MatchSignals>,
    pub output_file: Option<String>,
    pub error: Option<String>,
}

impl ReportRecord {
    /// 照合結果から作成（コピー失敗時は `error` に理由を入れる）
    pub fn from_outcome(
        image: &ImageInfo,
        outcome: &MatchOutcome,
        output_file: Option<&Path>,
        error: Option<String>,
    ) -> Self {
        let status = if error.is_some() {
            RecordStatus::Failed
        } else if outcome.matched.is_unknown() {
            RecordStatus::Unknown
        } else {
            RecordStatus::Matched
        };

        Self {
            source_file: image.file_name.clone(),
            source_path: image.path.display().to_string(),
            taken_at: image.taken_at.clone(),
            status,
            matched_description: Some(outcome.matched.description().to_string()),
            unmatched_label: outcome.matched.unmatched_label().map(str::to_string),
            confidence: outcome.confidence,
            confidence_percent: outcome.confidence_percent(),
            signals: Some(outcome.signals.clone()),
            output_file: output_file.map(|p| p.display().to_string()),
            error,
        }
    }

    /// 解析前に失敗した画像
    pub fn failed(image: &ImageInfo, error: String) -> Self {
        Self {
            source_file: image.file_name.clone(),
            source_path: image.path.display().to_string(),
            taken_at: image.taken_at.clone(),
            status: RecordStatus::Failed,
            matched_description: None,
            unmatched_label: None,
            confidence: 0.0,
            confidence_percent: 0,
            signals: None,
            output_file: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub matched: usize,
    pub unknown: usize,
    pub failed: usize,
    /// 一致率（0.0〜1.0）
    pub match_rate: f64,
}

impl Summary {
    pub fn from_records(records: &[ReportRecord]) -> Self {
        let count = |status: RecordStatus| records.iter().filter(|r| r.status == status).count();
        let total = records.len();
        let matched = count(RecordStatus::Matched);
        Self {
            total,
            matched,
            unknown: count(RecordStatus::Unknown),
            failed: count(RecordStatus::Failed),
            match_rate: if total == 0 { 0.0 } else { matched as f64 / total as f64 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub generated_at: String,
    pub images_dir: String,
    pub descriptions_file: String,
    pub run_dir: String,
    pub analyzers: Vec<AnalyzerKind>,
    pub candidate_count: usize,
    pub records: Vec<ReportRecord>,
    pub summary: Summary,
}

impl RunReport {
    pub fn new(
        images_dir: &Path,
        descriptions_file: &Path,
        run_dir: &Path,
        analyzers: Vec<AnalyzerKind>,
        candidate_count: usize,
    ) -> Self {
        Self {
            generated_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            images_dir: images_dir.display().to_string(),
            descriptions_file: descriptions_file.display().to_string(),
            run_dir: run_dir.display().to_string(),
            analyzers,
            candidate_count,
            records: Vec::new(),
            summary: Summary::default(),
        }
    }

    pub fn push(&mut self, record: ReportRecord) {
        self.records.push(record);
        self.summary = Summary::from_records(&self.records);
    }

    /// `<dir>/results.json` に書き出す
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(REPORT_FILE_NAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}
