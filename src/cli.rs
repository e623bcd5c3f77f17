use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "menu-match")]
#[command(about = "料理写真をメニュー説明と照合して整理するツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 写真フォルダを解析してメニューと照合
    Run {
        /// 写真フォルダ（デフォルト: 設定ファイルの imagesDir）
        #[arg(long)]
        images_dir: Option<PathBuf>,

        /// 結果の出力先（実行ごとに日時のサブフォルダを作成）
        #[arg(long)]
        results_dir: Option<PathBuf>,

        /// メニュー説明ファイル（1行1メニュー）
        #[arg(long)]
        descriptions_file: Option<PathBuf>,

        /// 対象画像のファイル名パターン（例: *.jpeg）
        #[arg(long)]
        image_pattern: Option<String>,

        /// 片方のサービスのみでの実行を許可
        #[arg(long)]
        allow_single_service: bool,

        /// 等間隔にN枚だけ処理
        #[arg(long)]
        sample: Option<usize>,

        /// Azure Vision を使用しない
        #[arg(long)]
        no_vision: bool,

        /// Azure OpenAI を使用しない
        #[arg(long)]
        no_openai: bool,
    },

    /// 各サービスの接続確認
    Check,

    /// 設定を表示/編集
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// 設定ファイルのパスを表示
        #[arg(long)]
        path: bool,

        /// Azure OpenAI のAPIキーを設定
        #[arg(long)]
        set_openai_key: Option<String>,

        /// Azure Vision のキーを設定
        #[arg(long)]
        set_vision_key: Option<String>,
    },
}
