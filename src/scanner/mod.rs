mod exif;

use crate::error::{MatchError, Result};
use image::ImageFormat;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Git LFS ポインタファイルの先頭行
const LFS_POINTER_PREFIX: &[u8] = b"version https://git-lfs.github.com/spec/";

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub file_name: String,
    /// EXIFの撮影日時
    pub taken_at: Option<String>,
}

/// フォルダ直下からパターンに一致する画像を列挙（ファイル名順）
///
/// パターンは `*` と `?` を使うファイル名グロブ（大文字小文字を区別しない）
pub fn scan_images(folder: &Path, pattern: &str) -> Result<Vec<ImageInfo>> {
    if !folder.is_dir() {
        return Err(MatchError::FolderNotFound(folder.display().to_string()));
    }

    let matcher = glob_to_regex(pattern)?;
    let mut images = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(1) // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if !matcher.is_match(&file_name) {
            continue;
        }

        let taken_at = exif::extract_taken_at(path).ok();
        images.push(ImageInfo {
            path: path.to_path_buf(),
            file_name,
            taken_at,
        });
    }

    // ファイル名でソート
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    debug!(folder = %folder.display(), pattern, count = images.len(), "画像スキャン完了");

    Ok(images)
}

/// ファイル名グロブを正規表現に変換
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(MatchError::Config("画像パターンが空です".into()));
    }

    let mut re = String::from("(?i)^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            _ => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');

    Regex::new(&re).map_err(|e| MatchError::Config(format!("画像パターンが不正です: {}", e)))
}

/// 等間隔にn件を抽出（nが0または件数以上なら全件）
pub fn sample_evenly<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    if n == 0 || n >= items.len() {
        return items.to_vec();
    }
    let step = items.len() / n;
    items.iter().step_by(step).take(n).cloned().collect()
}

/// Git LFS のポインタファイルか（実体が未取得）
pub fn is_lfs_pointer(bytes: &[u8]) -> bool {
    bytes.starts_with(LFS_POINTER_PREFIX)
}

/// 画像を読み込み、形式を判定
///
/// LFSポインタや画像として認識できないデータは画像単位のエラー
pub fn load_image(path: &Path) -> Result<(Vec<u8>, ImageFormat)> {
    if !path.exists() {
        return Err(MatchError::FileNotFound(path.display().to_string()));
    }

    let bytes = std::fs::read(path)?;
    if is_lfs_pointer(&bytes) {
        return Err(MatchError::ImageLoad(format!(
            "{} はGit LFSのポインタです（`git lfs pull` を実行してください）",
            path.display()
        )));
    }

    let format = image::guess_format(&bytes).map_err(|e| {
        MatchError::ImageLoad(format!("{}: 画像形式を判別できません ({})", path.display(), e))
    })?;

    Ok((bytes, format))
}

/// data URL 用のMIMEタイプ
pub fn mime_type(format: ImageFormat) -> &'static str {
    format.to_mime_type()
}
