//! Menu Match Common Library
//!
//! CLIとテストで共有される型と照合ロジック（I/Oなし）

pub mod error;
pub mod parser;
pub mod prompts;
pub mod scorer;
pub mod text;
pub mod types;

pub use error::{Error, Result};
pub use parser::{extract_confidence, parse_language_model_response};
pub use prompts::{build_system_prompt, build_user_prompt};
pub use scorer::{check_service_policy, score_match, ScoringConfig};
pub use types::{
    AnalysisResult, AnalyzerKind, AnalyzerOutput, LanguageModelAnalysis, MatchOutcome,
    MatchSignals, MatchedItem, VisionAnalysis,
};
