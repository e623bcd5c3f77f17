//! 照合結果による画像の整理
//!
//! 実行ごとに `<results_dir>/<YYYY-MM-DD_HH-MM-SS>` を作り、
//! 照合したメニュー名と信頼度を含む名前で画像をコピーする。

use crate::error::{MatchError, Result};
use menu_match_common::{MatchOutcome, MatchedItem};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

const RUN_DIR_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const DEFAULT_EXTENSION: &str = ".jpeg";

pub struct ResultOrganizer {
    run_dir: PathBuf,
    used_names: HashSet<String>,
}

impl ResultOrganizer {
    /// 日時のサブフォルダを作成（同じ秒に既存なら `_2` などを付ける）
    pub fn create(results_dir: &Path) -> Result<Self> {
        let stamp = chrono::Local::now().format(RUN_DIR_FORMAT).to_string();
        let mut run_dir = results_dir.join(&stamp);
        let mut n = 2;
        while run_dir.exists() {
            run_dir = results_dir.join(format!("{}_{}", stamp, n));
            n += 1;
        }
        Self::with_run_dir(run_dir)
    }

    pub fn with_run_dir(run_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&run_dir)?;
        Ok(Self {
            run_dir,
            used_names: HashSet::new(),
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// 照合結果の名前で画像をコピーし、コピー先を返す
    pub fn copy_result(&mut self, source: &Path, outcome: &MatchOutcome) -> Result<PathBuf> {
        let name = match_filename(outcome, &source_extension(source));
        let name = self.unique_name(&name);
        let target = self.run_dir.join(&name);

        std::fs::copy(source, &target).map_err(|e| {
            MatchError::Copy(format!("{} → {}: {}", source.display(), target.display(), e))
        })?;

        debug!(source = %source.display(), target = %target.display(), "画像をコピー");
        Ok(target)
    }

    /// 今回の実行内・既存ファイルと重複しない名前
    fn unique_name(&mut self, name: &str) -> String {
        let (stem, ext) = split_extension(name);
        let mut candidate = name.to_string();
        let mut n = 2;
        while self.used_names.contains(&candidate) || self.run_dir.join(&candidate).exists() {
            candidate = format!("{}_{}{}", stem, n, ext);
            n += 1;
        }
        self.used_names.insert(candidate.clone());
        candidate
    }
}

/// 出力ファイル名
///
/// - 一致: `<メニュー名>_conf<pct><ext>`
/// - UNMATCHED指定: `UNMATCHED_<略称>_conf<pct><ext>`
/// - 該当なし: `UNKNOWN_conf<pct><ext>`
pub fn match_filename(outcome: &MatchOutcome, extension: &str) -> String {
    let pct = outcome.confidence_percent();
    match &outcome.matched {
        MatchedItem::Candidate { description } => {
            format!("{}_conf{}{}", sanitize_filename(description), pct, extension)
        }
        MatchedItem::Unknown { label: Some(label) } if !label.trim().is_empty() => {
            format!("UNMATCHED_{}_conf{}{}", sanitize_filename(label), pct, extension)
        }
        MatchedItem::Unknown { .. } => format!("UNKNOWN_conf{}{}", pct, extension),
    }
}

/// ASCII英数字・`_`・`-` 以外を `_` に置換（連続空白は1つの `_`）
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();

    if sanitized.is_empty() {
        "item".to_string()
    } else {
        sanitized
    }
}

/// 元ファイルの拡張子（ドット付き、なければ `.jpeg`）
fn source_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    }
}
