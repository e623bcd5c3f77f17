//! プロンプト生成モジュール
//!
//! 言語モデルに送るプロンプト:
//! - FOOD_TAGS: 食品関連タグの定数
//! - build_system_prompt: システムプロンプト
//! - build_vision_context: Vision API結果をプロンプト用に整形
//! - build_user_prompt: メニュー候補付きのユーザープロンプト

use crate::types::VisionAnalysis;

/// 食品関連タグ（Vision APIのタグ名）
pub const FOOD_TAGS: &[&str] = &[
    "food", "sandwich", "bread", "burger", "hamburger", "meal", "lunch", "dinner",
    "breakfast", "plate", "meat", "cheese", "vegetable", "dessert", "salad", "wrap",
    "pasta", "pizza", "seafood", "rice", "chicken", "beef", "pork", "fish", "sauce",
    "condiment",
];

/// プロンプトに含めるメニュー候補の上限
pub const MAX_PROMPT_DESCRIPTIONS: usize = 100;

/// プロンプトに含めるOCR行の信頼度下限
const CONTEXT_TEXT_MIN_CONFIDENCE: f64 = 0.5;

/// プロンプトに含めるタグの信頼度下限
const CONTEXT_TAG_MIN_CONFIDENCE: f64 = 0.7;

pub fn is_food_tag(name: &str) -> bool {
    let name = name.trim().to_lowercase();
    FOOD_TAGS.contains(&name.as_str())
}

/// システムプロンプト
pub fn build_system_prompt() -> String {
    r#"You are a visual analysis assistant specializing in food identification.
For every image:
1. Read any text visible in the image that could identify the food.
2. Describe the primary food item accurately.
3. Match the item to one menu description when reasonable, otherwise mark it as UNMATCHED.

FOOD IDENTIFICATION GUIDELINES:
- "Chicken Salad" is chopped or shredded chicken mixed with mayonnaise as a spread.
- Chicken pieces or a breaded patty on bread or a bun is a chicken sandwich.
- A burger has a ground meat patty; a sandwich has sliced meat or chicken pieces.
- A sub is on an elongated roll; a sandwich is on sliced bread or a round bun.
- A wrap is in a tortilla or flatbread.

Use a balanced confidence scale from 1 to 10:
- 8-10: the item clearly matches the description
- 5-7: the item generally matches with minor differences
- 1-4: some similarity but significant differences"#
        .to_string()
}

/// Vision API結果をプロンプト用コンテキストに整形
pub fn build_vision_context(vision: &VisionAnalysis) -> String {
    let mut context = String::from(
        "Azure Vision API results for this image are provided to help your analysis:\n\n",
    );

    if let Some(caption) = &vision.caption {
        if !caption.text.trim().is_empty() {
            context.push_str(&format!(
                "VISION API CAPTION: {} (Confidence: {:.2})\n\n",
                caption.text.trim(),
                caption.confidence
            ));
        }
    }

    let text_lines: Vec<String> = vision
        .text_lines
        .iter()
        .filter(|line| line.confidence > CONTEXT_TEXT_MIN_CONFIDENCE)
        .map(|line| format!("- \"{}\" (Confidence: {:.2})", line.text, line.confidence))
        .collect();
    if !text_lines.is_empty() {
        context.push_str("VISION API TEXT DETECTION:\n");
        context.push_str(&text_lines.join("\n"));
        context.push_str("\n\n");
    }

    let food_tags: Vec<String> = vision
        .tags
        .iter()
        .filter(|tag| tag.confidence > CONTEXT_TAG_MIN_CONFIDENCE && is_food_tag(&tag.name))
        .map(|tag| format!("- {} (Confidence: {:.2})", tag.name, tag.confidence))
        .collect();
    if !food_tags.is_empty() {
        context.push_str("VISION API FOOD-RELATED TAGS:\n");
        context.push_str(&food_tags.join("\n"));
        context.push_str("\n\n");
    }

    if !vision.objects.is_empty() {
        context.push_str("VISION API OBJECTS DETECTED:\n");
        for object in &vision.objects {
            context.push_str(&format!("- {} (Confidence: {:.2})\n", object.name, object.confidence));
        }
        context.push('\n');
    }

    context.push_str(
        "Use the detected text as a strong signal, treat the caption as a hint, \
         and prioritize what you can directly observe when the two disagree.\n\n",
    );
    context
}

/// ユーザープロンプト生成
///
/// # Arguments
/// * `descriptions` - メニュー候補（先頭から最大 MAX_PROMPT_DESCRIPTIONS 件）
/// * `vision` - Vision API結果（あればコンテキストとして付加）
pub fn build_user_prompt(descriptions: &[String], vision: Option<&VisionAnalysis>) -> String {
    let menu = descriptions
        .iter()
        .take(MAX_PROMPT_DESCRIPTIONS)
        .map(|d| format!("- {}", d))
        .collect::<Vec<_>>()
        .join("\n");

    let vision_context = vision.map(build_vision_context).unwrap_or_default();

    format!(
        r#"{vision_context}Identify the food item in this image.

First read any text visible in the image (labels, packaging, price tags) and report it exactly as written.
Then match the image to one of these menu item descriptions if possible:

{menu}

If no description clearly matches, write UNMATCHED followed by a short ALL CAPS abbreviated name
(for example "UNMATCHED FRIED CHKN SNDWCH") and still give a confidence score for your description.

FORMAT YOUR RESPONSE AS:
TEXT DETECTED: <text read from the image, or NONE>
MATCH: <exact menu item from the list, or UNMATCHED <ABBREVIATED NAME>>
Confidence score: <1-10>/10
<brief description of the key identifying features>"#
    )
}
