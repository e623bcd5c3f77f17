use crate::error::{MatchError, Result};
use menu_match_common::ScoringConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_OPENAI_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
pub const ENV_OPENAI_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT";
pub const ENV_VISION_ENDPOINT: &str = "AZURE_VISION_ENDPOINT";
pub const ENV_VISION_KEY: &str = "AZURE_VISION_KEY";
pub const ENV_VISION_REGION: &str = "AZURE_VISION_REGION";

/// Azure OpenAI 接続設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenAiSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_version: String,
    pub deployment: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            api_version: "2024-12-01-preview".into(),
            deployment: "o1".into(),
        }
    }
}

impl OpenAiSettings {
    pub fn is_configured(&self) -> bool {
        has_value(&self.endpoint) && has_value(&self.api_key)
    }
}

/// Azure Vision 接続設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisionSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub region: String,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            region: "westus".into(),
        }
    }
}

impl VisionSettings {
    pub fn is_configured(&self) -> bool {
        has_value(&self.endpoint) && has_value(&self.api_key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub openai: OpenAiSettings,
    pub vision: VisionSettings,
    pub scoring: ScoringConfig,
    pub descriptions_file: PathBuf,
    pub images_dir: PathBuf,
    pub results_dir: PathBuf,
    pub image_pattern: String,
    pub timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai: OpenAiSettings::default(),
            vision: VisionSettings::default(),
            scoring: ScoringConfig::default(),
            descriptions_file: PathBuf::from("food-descriptions.txt"),
            images_dir: PathBuf::from("images"),
            results_dir: PathBuf::from("results"),
            image_pattern: "*.jpeg".into(),
            timeout_seconds: 120,
        }
    }
}

impl Config {
    /// 設定ファイルを読み込み、環境変数で上書き
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// 設定ファイルのみ読み込み（存在しなければデフォルト）
    pub fn load_file() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.scoring.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| MatchError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("menu-match").join("config.json"))
    }

    /// 環境変数による上書き（空文字は無視）
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_OPENAI_ENDPOINT) {
            self.openai.endpoint = Some(v);
        }
        if let Some(v) = get(ENV_OPENAI_API_KEY) {
            self.openai.api_key = Some(v);
        }
        if let Some(v) = get(ENV_OPENAI_API_VERSION) {
            self.openai.api_version = v;
        }
        if let Some(v) = get(ENV_OPENAI_DEPLOYMENT) {
            self.openai.deployment = v;
        }
        if let Some(v) = get(ENV_VISION_ENDPOINT) {
            self.vision.endpoint = Some(v);
        }
        if let Some(v) = get(ENV_VISION_KEY) {
            self.vision.api_key = Some(v);
        }
        if let Some(v) = get(ENV_VISION_REGION) {
            self.vision.region = v;
        }
    }

    pub fn set_openai_key(&mut self, key: String) -> Result<()> {
        self.openai.api_key = Some(key);
        self.save()
    }

    pub fn set_vision_key(&mut self, key: String) -> Result<()> {
        self.vision.api_key = Some(key);
        self.save()
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// 表示用にキーを伏せる
pub fn mask_secret(value: Option<&str>) -> String {
    match value {
        Some(v) if v.chars().count() > 8 => {
            let tail: String = v.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            format!("****{}", tail)
        }
        Some(v) if !v.is_empty() => "****".into(),
        _ => "未設定".into(),
    }
}
