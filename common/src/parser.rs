//! APIレスポンスパーサー
//!
//! 言語モデルの自由記述レスポンスから、読み取りテキスト・推定メニュー・
//! UNMATCHED指定・信頼度を抽出する。

use crate::error::{Error, Result};
use crate::types::LanguageModelAnalysis;
use regex::Regex;

lazy_static::lazy_static! {
    static ref TEXT_DETECTED_RE: Regex = Regex::new(r"(?i)^text\s+detected\s*:\s*(.*)$").unwrap();
    static ref MATCH_LINE_RE: Regex =
        Regex::new(r"(?i)^(?:best\s+)?match(?:ing\s+menu\s+item)?\s*:\s*(.+)$").unwrap();
    static ref CONFIDENCE_RE: Regex =
        Regex::new(r"(?i)confidence[\s:]*(?:score)?[\s:]*(\d+(?:\.\d+)?)(?:\s*/\s*10)?").unwrap();
    static ref CONFIDENCE_LINE_RE: Regex = Regex::new(r"(?i)^confidence(?:\s+score)?\s*[:\-]").unwrap();
    static ref UNMATCHED_RE: Regex = Regex::new(r"(?i)\bunmatched\b[\s\-:]*([a-z0-9][a-z0-9 ]*)?").unwrap();
    static ref TRAILING_CONFIDENCE_RE: Regex = Regex::new(r"(?i)\s*confidence.*$").unwrap();
}

/// 推定メニュー名とみなす行の最大単語数（MATCH:行がない場合）
const MAX_BARE_GUESS_WORDS: usize = 6;

/// 言語モデルのレスポンスをパース
///
/// 想定フォーマット:
/// ```text
/// TEXT DETECTED: <読み取りテキスト>
/// MATCH: <メニュー名 または UNMATCHED 略称>
/// Confidence score: 8/10
/// <説明>
/// ```
/// 行の順序や装飾（箇条書き記号・角括弧・太字）は問わない。
///
/// # Examples
/// ```
/// use menu_match_common::parse_language_model_response;
///
/// let analysis = parse_language_model_response("MATCH: Turkey Club\nConfidence score: 7/10").unwrap();
/// assert_eq!(analysis.guessed_match.as_deref(), Some("Turkey Club"));
/// assert_eq!(analysis.confidence, Some(7));
/// ```
pub fn parse_language_model_response(response: &str) -> Result<LanguageModelAnalysis> {
    if response.trim().is_empty() {
        return Err(Error::Parse("レスポンスが空です".into()));
    }

    let mut analysis = LanguageModelAnalysis {
        confidence: extract_confidence(response),
        raw_response: response.to_string(),
        ..Default::default()
    };

    let mut body = Vec::new();

    for raw_line in response.lines() {
        let line = clean_line(raw_line);
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = TEXT_DETECTED_RE.captures(line) {
            let text = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            if analysis.detected_text.is_none() && !is_none_marker(text) {
                analysis.detected_text = Some(text.to_string());
            }
            continue;
        }

        if let Some(label) = extract_unmatched_label(line) {
            if analysis.unmatched_label.is_none() {
                analysis.unmatched_label = Some(label);
            }
            continue;
        }

        if let Some(caps) = MATCH_LINE_RE.captures(line) {
            let value = caps.get(1).map(|m| strip_quotes(m.as_str())).unwrap_or_default();
            if analysis.guessed_match.is_none() && !value.is_empty() {
                analysis.guessed_match = Some(value.to_string());
            }
            continue;
        }

        if CONFIDENCE_LINE_RE.is_match(line) {
            continue;
        }

        body.push(line);
    }

    // MATCH:行がなければ、短い単独行を推定メニュー名とみなす
    if analysis.guessed_match.is_none() && analysis.unmatched_label.is_none() {
        if let Some(pos) = body.iter().position(|line| is_bare_guess(line)) {
            analysis.guessed_match = Some(strip_quotes(body.remove(pos)).to_string());
        }
    }

    analysis.description = body.join("\n");
    Ok(analysis)
}

/// 信頼度（1〜10）を抽出
///
/// 10を超える値は100点満点とみなして10で割る。0や抽出失敗はNone。
pub fn extract_confidence(text: &str) -> Option<u8> {
    let caps = CONFIDENCE_RE.captures(text)?;
    let mut value: f64 = caps.get(1)?.as_str().parse().ok()?;
    if value > 10.0 {
        value /= 10.0;
    }
    let rounded = value.round();
    if rounded < 1.0 {
        return None;
    }
    Some(rounded.min(10.0) as u8)
}

/// UNMATCHED指定の略称を抽出（大文字化、末尾の信頼度表記は除去）
fn extract_unmatched_label(line: &str) -> Option<String> {
    let caps = UNMATCHED_RE.captures(line)?;
    let label = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let label = TRAILING_CONFIDENCE_RE.replace(label, "");
    Some(label.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase())
}

/// 箇条書き記号・角括弧・太字を除去
fn clean_line(line: &str) -> &str {
    line.trim()
        .trim_start_matches(|c: char| c == '-' || c == '*' || c == '[' || c == '#' || c.is_whitespace())
        .trim_end_matches(|c: char| c == ']' || c == '*' || c.is_whitespace())
}

fn strip_quotes(value: &str) -> &str {
    value.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '`').trim()
}

fn is_none_marker(text: &str) -> bool {
    text.is_empty() || matches!(text.to_lowercase().as_str(), "none" | "n/a" | "no text")
}

fn is_bare_guess(line: &str) -> bool {
    let word_count = line.split_whitespace().count();
    word_count > 0 && word_count <= MAX_BARE_GUESS_WORDS && !line.ends_with('.') && !line.contains(':')
}
