//! 照合スコアリング（複数サービス結果の統合）
//!
//! Vision APIと言語モデルの結果を候補メニューと突き合わせ、
//! 最良の候補と0.0〜1.0の信頼度を決定する。
//!
//! ## 選択の優先順位
//! 1. OCRテキストとの直接一致（信頼度 `ocr_match_confidence`）
//! 2. 言語モデルの推定メニューが候補にある
//! 3. 単語一致スコア最大の候補（`min_match_score` 以上）
//!
//! 両サービスが単独でも同じ候補を選ぶ場合は `synergy_boost` を加算する。
//! 該当なしの信頼度は `unknown_confidence_cap` で頭打ち。

use crate::error::{Error, Result};
use crate::text::{normalize, words, TextIndex};
use crate::types::{
    AnalysisResult, AnalyzerKind, LanguageModelAnalysis, MatchOutcome, MatchSignals, MatchedItem,
    OcrSource, SelectionRule, VisionAnalysis,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// 候補がOCR断片を含む場合に部分一致とみなす最小文字数
const MIN_OCR_FRAGMENT_CHARS: usize = 4;

/// スコアリングの調整値
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringConfig {
    /// OCR直接一致時の信頼度
    pub ocr_match_confidence: f64,
    /// OCR直接一致とみなす重なり度
    pub ocr_overlap_threshold: f64,
    /// OCR行として採用する信頼度下限
    pub ocr_min_confidence: f64,
    /// 単語照合に使うタグの信頼度下限
    pub tag_min_confidence: f64,
    /// 単語一致で候補を採用する最小スコア
    pub min_match_score: f64,
    /// 両サービス一致時の加算値
    pub synergy_boost: f64,
    /// 該当なし時の信頼度上限
    pub unknown_confidence_cap: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            ocr_match_confidence: 0.9,
            ocr_overlap_threshold: 0.8,
            ocr_min_confidence: 0.5,
            tag_min_confidence: 0.7,
            min_match_score: 0.3,
            synergy_boost: 0.1,
            unknown_confidence_cap: 0.9,
        }
    }
}

impl ScoringConfig {
    /// 値の範囲を検証（設定ファイルからの読み込み時）
    pub fn validate(&self) -> Result<()> {
        let unit_fields = [
            ("ocrMatchConfidence", self.ocr_match_confidence),
            ("ocrOverlapThreshold", self.ocr_overlap_threshold),
            ("ocrMinConfidence", self.ocr_min_confidence),
            ("tagMinConfidence", self.tag_min_confidence),
            ("minMatchScore", self.min_match_score),
            ("synergyBoost", self.synergy_boost),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{} は0.0〜1.0で指定してください: {}",
                    name, value
                )));
            }
        }

        let max_cap = Self::default().unknown_confidence_cap;
        if !(0.0..=max_cap).contains(&self.unknown_confidence_cap) {
            return Err(Error::Config(format!(
                "unknownConfidenceCap は0.0〜{}で指定してください: {}",
                max_cap, self.unknown_confidence_cap
            )));
        }
        Ok(())
    }
}

/// 有効なサービス構成を検証
///
/// サービスなし、または1つだけ有効で `allow_single_service` が偽ならエラー
pub fn check_service_policy(enabled: &[AnalyzerKind], allow_single_service: bool) -> Result<()> {
    match enabled {
        [] => Err(Error::Config("解析サービスが1つも有効になっていません".into())),
        [only] if !allow_single_service => Err(Error::Config(format!(
            "{} のみ有効です。単独で実行するには --allow-single-service を指定してください",
            only
        ))),
        _ => Ok(()),
    }
}

/// 解析結果から最良の候補を選ぶ
///
/// 入力不備ではエラーにならず「該当なし」を返す。
/// エラーになるのはサービス構成が方針に反する場合のみ。
pub fn score_match(
    candidates: &[String],
    analysis: &AnalysisResult,
    allow_single_service: bool,
    config: &ScoringConfig,
) -> Result<MatchOutcome> {
    check_service_policy(&analysis.enabled_analyzers(), allow_single_service)?;

    let vision = analysis.vision.completed();
    let llm = analysis.language_model.completed();

    let mut signals = MatchSignals {
        analyzers: analysis.completed_analyzers(),
        llm_confidence: llm.and_then(|l| l.normalized_confidence()),
        llm_explicit_unmatched: llm.map(|l| l.is_explicit_unmatched()).unwrap_or(false),
        ..Default::default()
    };
    let unmatched_label = llm.and_then(|l| l.unmatched_label.clone());

    if candidates.is_empty() || (vision.is_none() && llm.is_none()) {
        return Ok(MatchOutcome::unknown(unmatched_label, 0.0, signals));
    }

    let mut combined = select(candidates, vision, llm, config);

    // 各サービス単独での選択
    let vision_alone = vision.map(|v| select(candidates, Some(v), None, config));
    let llm_alone = llm.map(|l| select(candidates, None, Some(l), config));

    // 単独の選択が一致したら、結合テキストの単語一致より優先する
    if let (Some(v), Some(l)) = (&vision_alone, &llm_alone) {
        if v.index.is_some() && v.index == l.index && combined.index != v.index {
            let stronger = if v.base >= l.base { v } else { l };
            combined.rule = stronger.rule;
            combined.index = stronger.index;
            combined.base = stronger.base;
        }
    }

    signals.rule = combined.rule;
    signals.ocr_direct_match = combined.rule == SelectionRule::OcrDirect;
    signals.ocr_source = combined.ocr_source;
    signals.llm_guess_matched = combined.guess_matched;
    if let Some((idx, score)) = combined.overlap {
        signals.word_overlap_winner = Some(candidates[idx].clone());
        signals.word_overlap_score = score;
    }

    signals.vision_choice = vision_alone
        .as_ref()
        .and_then(|s| s.index)
        .map(|idx| candidates[idx].clone());
    signals.llm_choice = llm_alone
        .as_ref()
        .and_then(|s| s.index)
        .map(|idx| candidates[idx].clone());

    let Some(index) = combined.index else {
        let confidence = combined.base.max(0.0).min(config.unknown_confidence_cap);
        signals.base_confidence = combined.base;
        return Ok(MatchOutcome::unknown(unmatched_label, confidence, signals));
    };

    let mut base = combined.base;
    if let (Some(v), Some(l)) = (&vision_alone, &llm_alone) {
        if v.index == Some(index) && l.index == Some(index) {
            // 単独時の信頼度を下回らないようにしてから加算
            base = base.max(v.base).max(l.base);
            signals.synergy_applied = true;
            signals.synergy_boost = config.synergy_boost;
        }
    }
    signals.base_confidence = base;

    let confidence = (base + signals.synergy_boost).max(0.0).min(1.0);
    Ok(MatchOutcome {
        matched: MatchedItem::Candidate {
            description: candidates[index].clone(),
        },
        confidence,
        signals,
    })
}

/// 候補選択の中間結果（シナジー加算前）
#[derive(Debug, Clone, Default)]
struct Selection {
    rule: SelectionRule,
    index: Option<usize>,
    base: f64,
    ocr_source: Option<OcrSource>,
    overlap: Option<(usize, f64)>,
    guess_matched: bool,
}

fn select(
    candidates: &[String],
    vision: Option<&VisionAnalysis>,
    llm: Option<&LanguageModelAnalysis>,
    config: &ScoringConfig,
) -> Selection {
    let mut selection = Selection::default();

    // OCRテキスト: Vision優先、なければ言語モデルの読み取り結果
    let vision_lines = vision
        .map(|v| v.ocr_lines(config.ocr_min_confidence))
        .unwrap_or_default();
    let llm_detected = llm
        .and_then(|l| l.detected_text.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let ocr_fragments: Vec<&str> = if !vision_lines.is_empty() {
        selection.ocr_source = Some(OcrSource::Vision);
        vision_lines.clone()
    } else if let Some(text) = llm_detected {
        selection.ocr_source = Some(OcrSource::LanguageModel);
        vec![text]
    } else {
        Vec::new()
    };

    let combined_text = combined_text_index(vision, llm, config);
    selection.overlap = best_word_overlap(candidates, &combined_text);

    let llm_confidence = llm.and_then(|l| l.normalized_confidence());
    let explicit_unmatched = llm.map(|l| l.is_explicit_unmatched()).unwrap_or(false);
    let llm_guess = llm
        .and_then(|l| l.guessed_match.as_deref())
        .and_then(|guess| resolve_candidate(candidates, guess));
    selection.guess_matched = llm_guess.is_some();

    if let Some(idx) = find_ocr_match(candidates, &ocr_fragments, config.ocr_overlap_threshold) {
        selection.rule = SelectionRule::OcrDirect;
        selection.index = Some(idx);
        selection.base = config.ocr_match_confidence;
        return selection;
    }

    if let Some(idx) = llm_guess {
        selection.rule = SelectionRule::LanguageModelGuess;
        selection.index = Some(idx);
        selection.base = llm_confidence.unwrap_or_else(|| {
            word_overlap_score(&candidates[idx], &combined_text).max(config.min_match_score)
        });
        return selection;
    }

    let winner = selection
        .overlap
        .filter(|&(_, score)| score >= config.min_match_score);

    if let Some((idx, score)) = winner {
        // 言語モデルがUNMATCHEDと明示した場合、Vision単独でも同じ候補になる時だけ採用
        let vetoed = explicit_unmatched
            && vision
                .map(|v| select(candidates, Some(v), None, config).index != Some(idx))
                .unwrap_or(true);

        if !vetoed {
            selection.rule = SelectionRule::WordOverlap;
            selection.index = Some(idx);
            selection.base = match llm_confidence {
                Some(c) if !explicit_unmatched => c,
                _ => score,
            };
            return selection;
        }
    }

    // 該当なし: UNMATCHED明示なら言語モデルの信頼度、それ以外は最良スコア
    let best_score = selection.overlap.map(|(_, s)| s).unwrap_or(0.0);
    selection.base = match llm_confidence {
        Some(c) if explicit_unmatched => c,
        _ => best_score,
    };
    selection
}

/// 単語照合用の結合テキスト（説明・読み取りテキスト・推定名・OCR・キャプション・食品タグ）
fn combined_text_index(
    vision: Option<&VisionAnalysis>,
    llm: Option<&LanguageModelAnalysis>,
    config: &ScoringConfig,
) -> TextIndex {
    let mut parts: Vec<&str> = Vec::new();

    if let Some(l) = llm {
        parts.push(&l.description);
        if let Some(text) = &l.detected_text {
            parts.push(text);
        }
        if let Some(guess) = &l.guessed_match {
            parts.push(guess);
        }
    }

    if let Some(v) = vision {
        parts.extend(v.ocr_lines(config.ocr_min_confidence));
        if let Some(caption) = v.caption_text() {
            parts.push(caption);
        }
        parts.extend(v.food_tags(config.tag_min_confidence));
    }

    TextIndex::from_parts(parts)
}

/// 単語一致スコア（候補の単語のうちテキストに現れる割合）
pub fn word_overlap_score(candidate: &str, text: &TextIndex) -> f64 {
    let candidate_words = words(candidate);
    if candidate_words.is_empty() {
        return 0.0;
    }
    let found = candidate_words
        .iter()
        .filter(|w| text.contains_word(w))
        .count();
    found as f64 / candidate_words.len() as f64
}

/// 単語一致スコア最大の候補（同点はリスト順で先のもの、全て0ならNone）
pub fn best_word_overlap(candidates: &[String], text: &TextIndex) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        let score = word_overlap_score(candidate, text);
        if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
            best = Some((idx, score));
        }
    }
    best
}

/// OCR断片と候補の重なり度（0.0〜1.0）
///
/// - 断片が候補を語順通り含む、または候補の全単語を含む: 1.0
/// - 候補が断片（4文字以上）を含む: 文字数の比
/// - それ以外: 断片に現れる候補単語の割合
pub fn ocr_overlap(fragment: &str, candidate: &str) -> f64 {
    let fragment_words = words(fragment);
    let candidate_words = words(candidate);
    if fragment_words.is_empty() || candidate_words.is_empty() {
        return 0.0;
    }

    let fragment_joined = format!(" {} ", fragment_words.join(" "));
    let candidate_joined = format!(" {} ", candidate_words.join(" "));
    if fragment_joined.contains(&candidate_joined) {
        return 1.0;
    }

    let fragment_set: HashSet<&str> = fragment_words.iter().map(String::as_str).collect();
    let found = candidate_words
        .iter()
        .filter(|w| fragment_set.contains(w.as_str()))
        .count();
    let word_ratio = found as f64 / candidate_words.len() as f64;

    let fragment_len = fragment_joined.trim().chars().count();
    let containment = if fragment_len >= MIN_OCR_FRAGMENT_CHARS && candidate_joined.contains(&fragment_joined) {
        fragment_len as f64 / candidate_joined.trim().chars().count() as f64
    } else {
        0.0
    };

    word_ratio.max(containment)
}

/// OCR断片と候補の一致の強さ（行が候補と完全一致 > 語順通り含む > 単語の重なり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum OcrMatchTier {
    Words,
    Phrase,
    Exact,
}

fn ocr_match_tier(fragment: &str, candidate: &str) -> OcrMatchTier {
    let fragment_words = words(fragment);
    let candidate_words = words(candidate);
    if candidate_words.is_empty() {
        return OcrMatchTier::Words;
    }
    if fragment_words == candidate_words {
        return OcrMatchTier::Exact;
    }
    let fragment_joined = format!(" {} ", fragment_words.join(" "));
    let candidate_joined = format!(" {} ", candidate_words.join(" "));
    if fragment_joined.contains(&candidate_joined) {
        OcrMatchTier::Phrase
    } else {
        OcrMatchTier::Words
    }
}

/// OCR直接一致する候補を探す（各行と全行連結の両方で評価）
///
/// 一致の強さ、重なり度の順で比較し、語順通りの一致同士は単語数の多い候補を優先する。
/// 全く同じ評価ならリスト順で先の候補。
fn find_ocr_match(candidates: &[String], fragments: &[&str], threshold: f64) -> Option<usize> {
    if fragments.is_empty() {
        return None;
    }

    let joined = fragments.join(" ");
    let mut best: Option<(usize, OcrMatchTier, f64, usize)> = None;

    for (idx, candidate) in candidates.iter().enumerate() {
        let candidate_len = words(candidate).len();
        let key = fragments
            .iter()
            .copied()
            .chain(std::iter::once(joined.as_str()))
            .map(|fragment| {
                let tier = ocr_match_tier(fragment, candidate);
                let len = if tier > OcrMatchTier::Words { candidate_len } else { 0 };
                (tier, ocr_overlap(fragment, candidate), len)
            })
            .max_by(|a, b| compare_ocr_keys(*a, *b));

        let Some((tier, score, len)) = key else {
            continue;
        };
        if score < threshold {
            continue;
        }
        let better = best.map_or(true, |(_, t, s, l)| {
            compare_ocr_keys((tier, score, len), (t, s, l)) == Ordering::Greater
        });
        if better {
            best = Some((idx, tier, score, len));
        }
    }

    best.map(|(idx, ..)| idx)
}

fn compare_ocr_keys(a: (OcrMatchTier, f64, usize), b: (OcrMatchTier, f64, usize)) -> Ordering {
    a.0.cmp(&b.0)
        .then(a.1.total_cmp(&b.1))
        .then(a.2.cmp(&b.2))
}

/// 推定メニュー名を候補に解決（大文字小文字・前後の記号を無視して完全一致）
pub fn resolve_candidate(candidates: &[String], guess: &str) -> Option<usize> {
    let guess_key = words(guess).join(" ");
    if guess_key.is_empty() {
        return None;
    }
    candidates
        .iter()
        .position(|c| words(c).join(" ") == guess_key || normalize(c) == normalize(guess))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalyzerOutput, Tag, TextLine};

    fn candidates(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn menu() -> Vec<String> {
        candidates(&["Margherita Pizza", "Caesar Salad"])
    }

    fn vision_ocr(text: &str) -> VisionAnalysis {
        VisionAnalysis {
            text_lines: vec![TextLine {
                text: text.to_string(),
                confidence: 0.95,
            }],
            ..Default::default()
        }
    }

    fn llm(description: &str) -> LanguageModelAnalysis {
        LanguageModelAnalysis {
            description: description.to_string(),
            ..Default::default()
        }
    }

    fn both(vision: VisionAnalysis, llm: LanguageModelAnalysis) -> AnalysisResult {
        AnalysisResult {
            vision: AnalyzerOutput::Completed(vision),
            language_model: AnalyzerOutput::Completed(llm),
        }
    }

    fn score(candidates: &[String], analysis: &AnalysisResult) -> MatchOutcome {
        score_match(candidates, analysis, true, &ScoringConfig::default()).unwrap()
    }

    // =============================================
    // サービス構成
    // =============================================

    #[test]
    fn test_single_service_rejected_without_flag() {
        let analysis = AnalysisResult {
            vision: AnalyzerOutput::Disabled,
            language_model: AnalyzerOutput::Completed(llm("a salad")),
        };
        let result = score_match(&menu(), &analysis, false, &ScoringConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_single_service_allowed_with_flag() {
        let analysis = AnalysisResult {
            vision: AnalyzerOutput::Disabled,
            language_model: AnalyzerOutput::Completed(llm("caesar salad")),
        };
        let outcome = score_match(&menu(), &analysis, true, &ScoringConfig::default()).unwrap();
        assert_eq!(outcome.matched.description(), "Caesar Salad");
    }

    #[test]
    fn test_no_service_is_config_error() {
        let analysis = AnalysisResult::default();
        let result = score_match(&menu(), &analysis, true, &ScoringConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_failed_service_is_not_policy_violation() {
        // 有効だが失敗したサービスは単独実行扱いにならない
        let analysis = AnalysisResult {
            vision: AnalyzerOutput::Failed("timeout".to_string()),
            language_model: AnalyzerOutput::Completed(llm("caesar salad")),
        };
        let outcome = score_match(&menu(), &analysis, false, &ScoringConfig::default()).unwrap();
        assert_eq!(outcome.matched.description(), "Caesar Salad");
        assert_eq!(outcome.signals.analyzers, vec![AnalyzerKind::LanguageModel]);
        assert!(!outcome.signals.synergy_applied);
    }

    // =============================================
    // OCR直接一致
    // =============================================

    #[test]
    fn test_ocr_exact_match_scenario() {
        let analysis = both(vision_ocr("MARGHERITA PIZZA"), LanguageModelAnalysis::default());
        let outcome = score(&menu(), &analysis);
        assert_eq!(outcome.matched.description(), "Margherita Pizza");
        assert!(outcome.confidence >= 0.9);
        assert_eq!(outcome.signals.rule, SelectionRule::OcrDirect);
        assert!(outcome.signals.ocr_direct_match);
        assert_eq!(outcome.signals.ocr_source, Some(OcrSource::Vision));
    }

    #[test]
    fn test_ocr_match_beats_llm_guess() {
        let mut model = llm("looks like a salad");
        model.guessed_match = Some("Caesar Salad".to_string());
        model.confidence = Some(9);
        let analysis = both(vision_ocr("Margherita Pizza $12"), model);

        let outcome = score(&menu(), &analysis);
        assert_eq!(outcome.matched.description(), "Margherita Pizza");
        assert_eq!(outcome.signals.rule, SelectionRule::OcrDirect);
    }

    #[test]
    fn test_ocr_falls_back_to_llm_detected_text() {
        let mut model = llm("This looks like a sandwich.");
        model.detected_text = Some("Turkey Club".to_string());
        model.confidence = Some(7);
        let analysis = AnalysisResult {
            vision: AnalyzerOutput::Disabled,
            language_model: AnalyzerOutput::Completed(model),
        };

        let menu = candidates(&["Chicken Sandwich", "Turkey Club", "Veggie Wrap"]);
        let outcome = score(&menu, &analysis);
        assert_eq!(outcome.matched.description(), "Turkey Club");
        assert_eq!(outcome.signals.ocr_source, Some(OcrSource::LanguageModel));
        assert!(outcome.confidence > 0.8);
    }

    #[test]
    fn test_low_confidence_ocr_ignored() {
        let vision = VisionAnalysis {
            text_lines: vec![TextLine {
                text: "Margherita Pizza".to_string(),
                confidence: 0.2,
            }],
            ..Default::default()
        };
        let outcome = score(&menu(), &both(vision, LanguageModelAnalysis::default()));
        assert!(outcome.matched.is_unknown());
        assert!(!outcome.signals.ocr_direct_match);
    }

    #[test]
    fn test_ocr_overlap_values() {
        assert_eq!(ocr_overlap("MARGHERITA PIZZA", "Margherita Pizza"), 1.0);
        assert_eq!(ocr_overlap("Fresh margherita pizza today", "Margherita Pizza"), 1.0);
        assert_eq!(ocr_overlap("pizza margherita", "Margherita Pizza"), 1.0);
        assert_eq!(ocr_overlap("graham crackers", "Ham"), 0.0);
        assert_eq!(ocr_overlap("Pizza", "Margherita Pizza"), 0.5);
        assert_eq!(ocr_overlap("", "Margherita Pizza"), 0.0);
    }

    fn vision_lines(lines: &[&str]) -> VisionAnalysis {
        VisionAnalysis {
            text_lines: lines
                .iter()
                .map(|text| TextLine {
                    text: text.to_string(),
                    confidence: 0.95,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_ocr_line_match_beats_words_across_lines() {
        // 行をまたいだ単語の寄せ集めより、行そのものの一致を優先
        let menu = candidates(&["Chicken Salad", "Chicken Wrap"]);
        let analysis = both(
            vision_lines(&["Chicken Wrap", "Side Salad"]),
            LanguageModelAnalysis::default(),
        );

        let outcome = score(&menu, &analysis);
        assert_eq!(outcome.matched.description(), "Chicken Wrap");
        assert_eq!(outcome.signals.rule, SelectionRule::OcrDirect);
    }

    #[test]
    fn test_ocr_exact_line_beats_shorter_phrase() {
        let menu = candidates(&["Salad", "Caesar Salad"]);
        let analysis = both(vision_ocr("CAESAR SALAD"), LanguageModelAnalysis::default());
        assert_eq!(score(&menu, &analysis).matched.description(), "Caesar Salad");
    }

    #[test]
    fn test_ocr_longer_phrase_preferred() {
        let menu = candidates(&["Caesar Salad", "Grilled Chicken Caesar Salad"]);
        let analysis = both(
            vision_ocr("Grilled Chicken Caesar Salad Special"),
            LanguageModelAnalysis::default(),
        );
        assert_eq!(
            score(&menu, &analysis).matched.description(),
            "Grilled Chicken Caesar Salad"
        );
    }

    #[test]
    fn test_ocr_match_tier() {
        assert_eq!(ocr_match_tier("Caesar Salad!", "caesar salad"), OcrMatchTier::Exact);
        assert_eq!(ocr_match_tier("Fresh Caesar Salad", "Caesar Salad"), OcrMatchTier::Phrase);
        assert_eq!(ocr_match_tier("Salad Caesar", "Caesar Salad"), OcrMatchTier::Words);
    }

    // =============================================
    // 単語一致
    // =============================================

    #[test]
    fn test_word_overlap_scenario() {
        let analysis = both(
            VisionAnalysis::default(),
            llm("a salad with croutons and caesar dressing"),
        );
        let outcome = score(&menu(), &analysis);
        assert_eq!(outcome.matched.description(), "Caesar Salad");
        assert_eq!(outcome.signals.rule, SelectionRule::WordOverlap);
        assert_eq!(outcome.signals.word_overlap_winner.as_deref(), Some("Caesar Salad"));
        assert_eq!(outcome.signals.word_overlap_score, 1.0);
    }

    #[test]
    fn test_word_overlap_bounds() {
        let text = TextIndex::new("a salad with croutons and caesar dressing");
        assert_eq!(word_overlap_score("Margherita Pizza", &text), 0.0);
        assert_eq!(word_overlap_score("Caesar Salad", &text), 1.0);
        assert_eq!(word_overlap_score("Chicken Caesar Wrap", &text), 1.0 / 3.0);
        assert_eq!(word_overlap_score("", &text), 0.0);
    }

    #[test]
    fn test_best_word_overlap_tie_prefers_first() {
        let text = TextIndex::new("chicken");
        let menu = candidates(&["Chicken Salad", "Chicken Wrap"]);
        assert_eq!(best_word_overlap(&menu, &text), Some((0, 0.5)));
        assert_eq!(best_word_overlap(&menu, &TextIndex::new("pizza")), None);
    }

    #[test]
    fn test_word_overlap_uses_llm_confidence() {
        let mut model = llm("This is a chicken sandwich with lettuce.");
        model.confidence = Some(9);
        let analysis = both(VisionAnalysis::default(), model);
        let menu = candidates(&["Chicken Sandwich", "Turkey Club", "Veggie Wrap"]);

        let outcome = score(&menu, &analysis);
        assert_eq!(outcome.matched.description(), "Chicken Sandwich");
        assert!((outcome.confidence - 0.9).abs() < 1e-9);
        assert_eq!(outcome.signals.llm_confidence, Some(0.9));
    }

    #[test]
    fn test_food_tags_contribute() {
        let vision = VisionAnalysis {
            tags: vec![
                Tag { name: "pizza".to_string(), confidence: 0.9 },
                Tag { name: "table".to_string(), confidence: 0.99 },
            ],
            ..Default::default()
        };
        let analysis = AnalysisResult {
            vision: AnalyzerOutput::Completed(vision),
            language_model: AnalyzerOutput::Disabled,
        };
        let outcome = score(&menu(), &analysis);
        assert_eq!(outcome.matched.description(), "Margherita Pizza");
        assert_eq!(outcome.confidence, 0.5);
    }

    // =============================================
    // 言語モデルの推定
    // =============================================

    #[test]
    fn test_llm_guess_takes_priority_over_word_overlap() {
        let mut model = llm("pizza with salad on the side");
        model.guessed_match = Some("caesar salad".to_string());
        model.confidence = Some(6);
        let analysis = both(VisionAnalysis::default(), model);

        let outcome = score(&menu(), &analysis);
        assert_eq!(outcome.matched.description(), "Caesar Salad");
        assert_eq!(outcome.signals.rule, SelectionRule::LanguageModelGuess);
        assert!(outcome.signals.llm_guess_matched);
        assert!((outcome.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_guess_ignored() {
        let mut model = llm("a bowl of ramen");
        model.guessed_match = Some("Tonkotsu Ramen".to_string());
        let outcome = score(&menu(), &both(VisionAnalysis::default(), model));
        assert!(outcome.matched.is_unknown());
        assert!(!outcome.signals.llm_guess_matched);
    }

    #[test]
    fn test_resolve_candidate() {
        let menu = menu();
        assert_eq!(resolve_candidate(&menu, "  caesar SALAD. "), Some(1));
        assert_eq!(resolve_candidate(&menu, "Pizza"), None);
        assert_eq!(resolve_candidate(&menu, "   "), None);
    }

    // =============================================
    // シナジー
    // =============================================

    #[test]
    fn test_synergy_boost_when_both_agree() {
        let mut model = llm("thin crust pizza with basil");
        model.guessed_match = Some("Margherita Pizza".to_string());
        model.confidence = Some(8);

        let single = AnalysisResult {
            vision: AnalyzerOutput::Disabled,
            language_model: AnalyzerOutput::Completed(model.clone()),
        };
        let single_outcome = score(&menu(), &single);

        let combined = both(vision_ocr("Margherita Pizza"), model);
        let outcome = score(&menu(), &combined);

        assert!(outcome.signals.synergy_applied);
        assert_eq!(outcome.signals.vision_choice.as_deref(), Some("Margherita Pizza"));
        assert_eq!(outcome.signals.llm_choice.as_deref(), Some("Margherita Pizza"));
        assert!(outcome.confidence >= single_outcome.confidence);
        assert!((outcome.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_synergy_never_lowers_below_single_service() {
        // Vision単独は単語一致1.0、言語モデルは低い信頼度で同じ候補を推定
        let vision = VisionAnalysis {
            tags: vec![Tag { name: "pizza".to_string(), confidence: 0.9 }],
            caption: Some(crate::types::Caption {
                text: "a margherita pizza".to_string(),
                confidence: 0.8,
            }),
            ..Default::default()
        };
        let mut model = llm("pizza");
        model.guessed_match = Some("Margherita Pizza".to_string());
        model.confidence = Some(3);

        let vision_only = AnalysisResult {
            vision: AnalyzerOutput::Completed(vision.clone()),
            language_model: AnalyzerOutput::Disabled,
        };
        let vision_outcome = score(&menu(), &vision_only);

        let outcome = score(&menu(), &both(vision, model));
        assert_eq!(outcome.matched.description(), "Margherita Pizza");
        assert!(outcome.signals.synergy_applied);
        assert!(outcome.confidence >= vision_outcome.confidence);
    }

    #[test]
    fn test_agreed_choice_beats_combined_word_overlap() {
        // 結合テキストでは長い候補の単語が全て揃うが、両サービスとも単独では短い候補を選ぶ
        let menu = candidates(&["Grilled Chicken Caesar Salad", "Caesar Salad"]);
        let vision = VisionAnalysis {
            caption: Some(crate::types::Caption {
                text: "caesar salad with chicken".to_string(),
                confidence: 0.8,
            }),
            ..Default::default()
        };
        let mut model = llm("grilled caesar salad");
        model.confidence = Some(6);

        let vision_only = AnalysisResult {
            vision: AnalyzerOutput::Completed(vision.clone()),
            language_model: AnalyzerOutput::Disabled,
        };
        let vision_outcome = score(&menu, &vision_only);
        assert_eq!(vision_outcome.matched.description(), "Caesar Salad");

        let outcome = score(&menu, &both(vision, model));
        assert_eq!(outcome.matched.description(), "Caesar Salad");
        assert_eq!(outcome.signals.vision_choice.as_deref(), Some("Caesar Salad"));
        assert_eq!(outcome.signals.llm_choice.as_deref(), Some("Caesar Salad"));
        assert!(outcome.signals.synergy_applied);
        assert!(outcome.confidence >= vision_outcome.confidence);
    }

    #[test]
    fn test_no_synergy_when_services_disagree() {
        let mut model = llm("a salad");
        model.guessed_match = Some("Caesar Salad".to_string());
        model.confidence = Some(7);
        let vision = VisionAnalysis {
            tags: vec![Tag { name: "pizza".to_string(), confidence: 0.9 }],
            ..Default::default()
        };

        let outcome = score(&menu(), &both(vision, model));
        assert_eq!(outcome.matched.description(), "Caesar Salad");
        assert!(!outcome.signals.synergy_applied);
        assert_eq!(outcome.signals.synergy_boost, 0.0);
        assert!((outcome.confidence - 0.7).abs() < 1e-9);
    }

    // =============================================
    // 該当なし・上限
    // =============================================

    #[test]
    fn test_empty_candidates_always_unknown() {
        let mut model = llm("margherita pizza");
        model.guessed_match = Some("Margherita Pizza".to_string());
        model.confidence = Some(10);
        let outcome = score(&[], &both(vision_ocr("MARGHERITA PIZZA"), model));
        assert!(outcome.matched.is_unknown());
        assert_eq!(outcome.confidence, 0.0);
    }

    #[test]
    fn test_all_signals_absent_is_unknown() {
        let analysis = AnalysisResult {
            vision: AnalyzerOutput::Failed("error".to_string()),
            language_model: AnalyzerOutput::Failed("error".to_string()),
        };
        let outcome = score(&menu(), &analysis);
        assert!(outcome.matched.is_unknown());
        assert_eq!(outcome.confidence, 0.0);
        assert!(outcome.signals.analyzers.is_empty());
    }

    #[test]
    fn test_below_threshold_is_unknown() {
        let menu = candidates(&["Grilled Chicken Caesar Wrap Deluxe"]);
        let outcome = score(&menu, &both(VisionAnalysis::default(), llm("a wrap")));
        assert!(outcome.matched.is_unknown());
        assert!((outcome.confidence - 0.2).abs() < 1e-9);
        assert_eq!(outcome.signals.rule, SelectionRule::None);
    }

    #[test]
    fn test_explicit_unmatched_capped() {
        let mut model = llm("Breaded chicken on a bun.");
        model.unmatched_label = Some("FRIED CHKN SNDWCH".to_string());
        model.confidence = Some(10);
        let menu = candidates(&["Chicken Salad", "Turkey Club"]);

        let outcome = score(&menu, &both(VisionAnalysis::default(), model));
        assert!(outcome.matched.is_unknown());
        assert_eq!(outcome.matched.unmatched_label(), Some("FRIED CHKN SNDWCH"));
        assert!(outcome.confidence <= 0.9);
        assert!((outcome.confidence - 0.9).abs() < 1e-9);
        assert!(outcome.signals.llm_explicit_unmatched);
    }

    #[test]
    fn test_explicit_unmatched_overridden_when_vision_agrees() {
        let mut model = llm("creamy chicken salad spread");
        model.unmatched_label = Some("CHKN SPREAD".to_string());
        model.confidence = Some(4);
        let vision = VisionAnalysis {
            tags: vec![
                Tag { name: "chicken".to_string(), confidence: 0.9 },
                Tag { name: "salad".to_string(), confidence: 0.9 },
            ],
            ..Default::default()
        };
        let menu = candidates(&["Chicken Salad", "Turkey Club"]);

        let outcome = score(&menu, &both(vision, model));
        assert_eq!(outcome.matched.description(), "Chicken Salad");
        assert_eq!(outcome.signals.rule, SelectionRule::WordOverlap);
    }

    #[test]
    fn test_confidence_bounds_over_many_inputs() {
        let menu = candidates(&["Margherita Pizza", "Caesar Salad", "Turkey Club", "Veggie Wrap"]);
        let texts = ["", "pizza", "MARGHERITA PIZZA", "turkey club", "caesar", "wrap with veggie", "nothing"];
        let guesses = [None, Some("Turkey Club"), Some("Ramen")];
        let confidences = [None, Some(1), Some(5), Some(10)];
        let labels = [None, Some("SOUP")];

        for ocr in texts {
            for desc in texts {
                for guess in guesses {
                    for conf in confidences {
                        for label in labels {
                            let model = LanguageModelAnalysis {
                                description: desc.to_string(),
                                guessed_match: guess.map(str::to_string),
                                confidence: conf,
                                unmatched_label: label.map(str::to_string),
                                ..Default::default()
                            };
                            let outcome = score(&menu, &both(vision_ocr(ocr), model));
                            assert!(outcome.confidence <= 1.0);
                            assert!(outcome.confidence >= 0.0);
                            if outcome.matched.is_unknown() {
                                assert!(outcome.confidence <= 0.9);
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_custom_config_values() {
        let config = ScoringConfig {
            ocr_match_confidence: 0.95,
            synergy_boost: 0.15,
            ..Default::default()
        };
        let mut model = llm("pizza");
        model.guessed_match = Some("Margherita Pizza".to_string());
        let analysis = both(vision_ocr("Margherita Pizza"), model);

        let outcome = score_match(&menu(), &analysis, false, &config).unwrap();
        assert!(outcome.signals.synergy_applied);
        assert_eq!(outcome.signals.synergy_boost, 0.15);
        assert!((outcome.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_scoring_config_deserialize_partial() {
        let config: ScoringConfig = serde_json::from_str(r#"{"synergyBoost": 0.12}"#).unwrap();
        assert_eq!(config.synergy_boost, 0.12);
        assert_eq!(config.ocr_match_confidence, 0.9);
        assert_eq!(config.min_match_score, 0.3);
    }

    #[test]
    fn test_scoring_config_validate() {
        assert!(ScoringConfig::default().validate().is_ok());

        let invalid = [
            ScoringConfig { unknown_confidence_cap: -0.1, ..Default::default() },
            ScoringConfig { unknown_confidence_cap: 0.95, ..Default::default() },
            ScoringConfig { synergy_boost: -0.1, ..Default::default() },
            ScoringConfig { ocr_match_confidence: 1.5, ..Default::default() },
            ScoringConfig { min_match_score: f64::NAN, ..Default::default() },
        ];
        for config in invalid {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{:?}", config);
        }
    }

    #[test]
    fn test_negative_unknown_cap_does_not_panic() {
        let config = ScoringConfig {
            unknown_confidence_cap: -0.1,
            ..Default::default()
        };
        let analysis = both(VisionAnalysis::default(), llm("a plate of something"));
        let outcome = score_match(&menu(), &analysis, true, &config).unwrap();
        assert!(outcome.matched.is_unknown());
        assert!(outcome.confidence <= 0.0);
    }
}
