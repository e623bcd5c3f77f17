//! 一括処理
//!
//! 起動時の検証（サービス構成・メニュー説明・画像フォルダ）に失敗したら中止し、
//! 以降は1枚ずつ順に 解析 → 照合 → コピー → 記録 を行う。
//! 画像単位の失敗は記録して次の画像へ進む。

use crate::analyzer::{AnalyzerSet, ImageData};
use crate::config::Config;
use crate::descriptions::DescriptionStore;
use crate::error::{MatchError, Result};
use crate::organizer::ResultOrganizer;
use crate::report::{ReportRecord, RunReport};
use crate::scanner::{self, ImageInfo};
use indicatif::{ProgressBar, ProgressStyle};
use menu_match_common::{check_service_policy, score_match, AnalyzerKind, ScoringConfig};
use std::path::PathBuf;
use tracing::{info, warn};

/// 実行オプション（設定ファイル + CLI引数）
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub images_dir: PathBuf,
    pub results_dir: PathBuf,
    pub descriptions_file: PathBuf,
    pub image_pattern: String,
    pub allow_single_service: bool,
    pub sample: Option<usize>,
    pub scoring: ScoringConfig,
    pub show_progress: bool,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            images_dir: config.images_dir.clone(),
            results_dir: config.results_dir.clone(),
            descriptions_file: config.descriptions_file.clone(),
            image_pattern: config.image_pattern.clone(),
            allow_single_service: false,
            sample: None,
            scoring: config.scoring,
            show_progress: true,
        }
    }
}

/// 実行結果
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub report_path: PathBuf,
}

/// 接続確認のうえ、サービス構成が方針に合うか検証
pub async fn prepare_services(
    analyzers: &mut AnalyzerSet,
    allow_single_service: bool,
) -> Result<Vec<(AnalyzerKind, bool)>> {
    let availability = analyzers.check_availability().await;
    ensure_service_policy(&analyzers.enabled_kinds(), allow_single_service)?;
    Ok(availability)
}

fn ensure_service_policy(enabled: &[AnalyzerKind], allow_single_service: bool) -> Result<()> {
    check_service_policy(enabled, allow_single_service).map_err(|err| match err {
        menu_match_common::Error::Config(msg) => MatchError::Policy(msg),
        other => other.into(),
    })
}

/// 入力を検証し、全画像を処理してレポートを書き出す
pub async fn run(options: &RunOptions, analyzers: &AnalyzerSet) -> Result<RunOutcome> {
    ensure_service_policy(&analyzers.enabled_kinds(), options.allow_single_service)?;

    let descriptions = DescriptionStore::load(&options.descriptions_file)?;
    info!(count = descriptions.len(), "メニュー説明を読み込みました");

    let mut images = scanner::scan_images(&options.images_dir, &options.image_pattern)?;
    if let Some(n) = options.sample.filter(|&n| n > 0 && n < images.len()) {
        info!(sample = n, total = images.len(), "サンプリングして処理します");
        images = scanner::sample_evenly(&images, n);
    }
    info!(count = images.len(), "処理対象の画像");

    let mut organizer = ResultOrganizer::create(&options.results_dir)?;
    let mut report = RunReport::new(
        &options.images_dir,
        descriptions.path(),
        organizer.run_dir(),
        analyzers.enabled_kinds(),
        descriptions.len(),
    );

    let progress = progress_bar(images.len() as u64, options.show_progress);
    for image in &images {
        progress.set_message(image.file_name.clone());
        let record = process_image(image, descriptions.items(), analyzers, &mut organizer, options).await;
        report.push(record);
        progress.inc(1);
    }
    progress.finish_and_clear();

    let report_path = report.write(organizer.run_dir())?;
    info!(path = %report_path.display(), "レポートを保存しました");

    Ok(RunOutcome {
        report,
        report_path,
    })
}

async fn process_image(
    image: &ImageInfo,
    candidates: &[String],
    analyzers: &AnalyzerSet,
    organizer: &mut ResultOrganizer,
    options: &RunOptions,
) -> ReportRecord {
    let (bytes, format) = match scanner::load_image(&image.path) {
        Ok(loaded) => loaded,
        Err(err) => {
            warn!(file = %image.file_name, "画像を読み込めません: {}", err);
            return ReportRecord::failed(image, err.to_string());
        }
    };

    let data = ImageData {
        file_name: image.file_name.clone(),
        bytes,
        format,
    };
    let analysis = analyzers.analyze(&data, candidates).await;

    let outcome = match score_match(candidates, &analysis, options.allow_single_service, &options.scoring) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(file = %image.file_name, "照合できません: {}", err);
            return ReportRecord::failed(image, err.to_string());
        }
    };

    info!(
        file = %image.file_name,
        matched = outcome.matched.description(),
        confidence = outcome.confidence,
        rule = ?outcome.signals.rule,
        "照合結果"
    );

    match organizer.copy_result(&image.path, &outcome) {
        Ok(target) => ReportRecord::from_outcome(image, &outcome, Some(&target), None),
        Err(err) => {
            warn!(file = %image.file_name, "{}", err);
            ReportRecord::from_outcome(image, &outcome, None, Some(err.to_string()))
        }
    }
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("  {bar:40.cyan/blue} {pos}/{len} {msg}") {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar
}
