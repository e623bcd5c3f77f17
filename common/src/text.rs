//! テキスト正規化ユーティリティ
//!
//! 大文字小文字を区別しない比較と単語分割を提供する。

use std::collections::HashSet;

/// 小文字化して連続空白を1つにまとめる
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 空白で分割し、前後の記号を除いた小文字の単語列
pub fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// 単語の出現判定用インデックス
#[derive(Debug, Clone, Default)]
pub struct TextIndex {
    normalized: String,
    tokens: HashSet<String>,
}

impl TextIndex {
    pub fn new(text: &str) -> Self {
        Self {
            normalized: normalize(text),
            tokens: words(text).into_iter().collect(),
        }
    }

    /// 複数のテキスト断片から構築
    pub fn from_parts<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let joined = parts
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Self::new(&joined)
    }

    /// 単語がテキストに含まれるか
    ///
    /// トークン完全一致、または3文字以上なら部分文字列一致（複数形など）
    pub fn contains_word(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        if word.is_empty() {
            return false;
        }
        self.tokens.contains(&word) || (word.chars().count() > 2 && self.normalized.contains(&word))
    }
}
