use anyhow::Context;
use clap::Parser;
use menu_photo_match::{analyzer, cli, config, pipeline};
use analyzer::AnalyzerSet;
use cli::{Cli, Commands};
use config::{mask_secret, Config};
use menu_match_common::AnalyzerKind;
use pipeline::RunOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load().context("設定の読み込みに失敗しました")?;

    match cli.command {
        Commands::Run {
            images_dir,
            results_dir,
            descriptions_file,
            image_pattern,
            allow_single_service,
            sample,
            no_vision,
            no_openai,
        } => {
            println!("🍽  menu-match - メニュー照合\n");

            let mut options = RunOptions::from_config(&config);
            if let Some(dir) = images_dir {
                options.images_dir = dir;
            }
            if let Some(dir) = results_dir {
                options.results_dir = dir;
            }
            if let Some(file) = descriptions_file {
                options.descriptions_file = file;
            }
            if let Some(pattern) = image_pattern {
                options.image_pattern = pattern;
            }
            options.allow_single_service = allow_single_service;
            options.sample = sample;

            // 1. サービス確認
            println!("[1/3] サービスを確認中...");
            let mut analyzers = AnalyzerSet::from_config(&config, !no_vision, !no_openai)?;
            let availability = pipeline::prepare_services(&mut analyzers, allow_single_service).await?;
            for (kind, available) in &availability {
                println!("  {} {}", if *available { "✔" } else { "✘" }, service_label(*kind));
            }
            println!();

            // 2. 解析・照合
            println!("[2/3] 画像を解析中...");
            let outcome = pipeline::run(&options, &analyzers).await?;
            println!("✔ 解析完了\n");

            // 3. 結果
            println!("[3/3] 結果を保存しました: {}", outcome.report_path.display());
            let summary = &outcome.report.summary;
            println!("\n集計:");
            println!("  処理枚数: {}", summary.total);
            println!("  一致: {}", summary.matched);
            println!("  該当なし: {}", summary.unknown);
            println!("  失敗: {}", summary.failed);
            println!("  一致率: {:.1}%", summary.match_rate * 100.0);

            println!("\n✅ 完了");
        }

        Commands::Check => {
            println!("🔌 menu-match - 接続確認\n");

            let mut analyzers = AnalyzerSet::from_config(&config, true, true).unwrap_or_default();
            if !config.vision.is_configured() {
                println!("  ✘ {} (認証情報が未設定)", service_label(AnalyzerKind::Vision));
            }
            if !config.openai.is_configured() {
                println!("  ✘ {} (認証情報が未設定)", service_label(AnalyzerKind::LanguageModel));
            }
            for (kind, available) in analyzers.check_availability().await {
                let mark = if available { "✔ 利用可能" } else { "✘ 利用不可" };
                println!("  {} {}", mark, service_label(kind));
            }
        }

        Commands::Config {
            show,
            path,
            set_openai_key,
            set_vision_key,
        } => {
            // 環境変数の値を保存しないよう、ファイルの内容だけを編集する
            let mut file_config = Config::load_file()?;

            if let Some(key) = set_openai_key {
                file_config.set_openai_key(key)?;
                println!("✔ Azure OpenAI のAPIキーを設定しました");
            }

            if let Some(key) = set_vision_key {
                file_config.set_vision_key(key)?;
                println!("✔ Azure Vision のキーを設定しました");
            }

            if path {
                println!("{}", Config::config_path()?.display());
            }

            if show {
                println!("設定（環境変数を反映）:");
                println!("  Azure OpenAI:");
                println!("    エンドポイント: {}", config.openai.endpoint.as_deref().unwrap_or("未設定"));
                println!("    APIキー: {}", mask_secret(config.openai.api_key.as_deref()));
                println!("    APIバージョン: {}", config.openai.api_version);
                println!("    デプロイメント: {}", config.openai.deployment);
                println!("  Azure Vision:");
                println!("    エンドポイント: {}", config.vision.endpoint.as_deref().unwrap_or("未設定"));
                println!("    キー: {}", mask_secret(config.vision.api_key.as_deref()));
                println!("    リージョン: {}", config.vision.region);
                println!("  メニュー説明: {}", config.descriptions_file.display());
                println!("  画像フォルダ: {}", config.images_dir.display());
                println!("  結果フォルダ: {}", config.results_dir.display());
                println!("  画像パターン: {}", config.image_pattern);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
            }
        }
    }

    Ok(())
}

/// RUST_LOG があれば優先、なければ --verbose で debug
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "menu_photo_match=debug,menu_match_common=debug"
    } else {
        "menu_photo_match=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn service_label(kind: AnalyzerKind) -> &'static str {
    match kind {
        AnalyzerKind::Vision => "Azure Vision",
        AnalyzerKind::LanguageModel => "Azure OpenAI",
    }
}
