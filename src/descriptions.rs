//! メニュー説明ファイルの読み込み
//!
//! 1行1メニュー。空行は無視し、ファイル内の順序を保持する。

use crate::error::{MatchError, Result};
use crate::scanner::is_lfs_pointer;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DescriptionStore {
    path: PathBuf,
    items: Vec<String>,
}

impl DescriptionStore {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(MatchError::DescriptionsNotFound(path.display().to_string()));
        }

        let bytes = std::fs::read(path)?;
        if is_lfs_pointer(&bytes) {
            return Err(MatchError::LfsPointer(path.display().to_string()));
        }

        let items = parse_descriptions(&String::from_utf8_lossy(&bytes));
        if items.is_empty() {
            return Err(MatchError::EmptyDescriptions(path.display().to_string()));
        }

        debug!(path = %path.display(), count = items.len(), "メニュー説明を読み込み");
        Ok(Self {
            path: path.to_path_buf(),
            items,
        })
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// テキストからメニュー説明を抽出（前後空白除去、空行スキップ）
pub fn parse_descriptions(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_start_matches('\u{feff}').trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
