//! menu-photo-match
//!
//! 料理写真を Azure Vision と Azure OpenAI で解析し、メニュー説明と照合して
//! 照合結果入りのファイル名で整理する。

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod descriptions;
pub mod error;
pub mod organizer;
pub mod pipeline;
pub mod report;
pub mod scanner;
