use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("{service} の認証情報が設定されていません（環境変数 {env} または `menu-match config` で設定してください）")]
    MissingCredentials { service: String, env: String },

    #[error("メニュー説明ファイルが見つかりません: {0}")]
    DescriptionsNotFound(String),

    #[error("メニュー説明ファイルに有効な行がありません: {0}")]
    EmptyDescriptions(String),

    #[error("Git LFSのポインタファイルです（`git lfs pull` を実行してください）: {0}")]
    LfsPointer(String),

    #[error("サービス構成エラー: {0}")]
    Policy(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("画像のコピーに失敗: {0}")]
    Copy(String),

    #[error("API呼び出しエラー: {0}")]
    ApiCall(String),

    #[error("APIレスポンスのパースに失敗: {0}")]
    ApiParse(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] menu_match_common::Error),
}

impl MatchError {
    /// 実行全体を中止すべきエラーか（設定系）
    ///
    /// API・ファイル系は画像単位で回復する
    pub fn is_fatal(&self) -> bool {
        match self {
            MatchError::Config(_)
            | MatchError::MissingCredentials { .. }
            | MatchError::DescriptionsNotFound(_)
            | MatchError::EmptyDescriptions(_)
            | MatchError::LfsPointer(_)
            | MatchError::Policy(_)
            | MatchError::FolderNotFound(_) => true,
            MatchError::Common(menu_match_common::Error::Config(_)) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for MatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            MatchError::ApiParse(err.to_string())
        } else {
            MatchError::ApiCall(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, MatchError>;
