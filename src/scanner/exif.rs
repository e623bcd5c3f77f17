use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// EXIFから撮影日時を取得（DateTimeOriginal → DateTime の順）
pub fn extract_taken_at(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let mut bufreader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut bufreader)?;

    for tag in [exif::Tag::DateTimeOriginal, exif::Tag::DateTime] {
        if let Some(field) = exif.get_field(tag, exif::In::PRIMARY) {
            let value = field.display_value().to_string();
            if !value.trim().is_empty() {
                return Ok(value);
            }
        }
    }

    Err("EXIFに撮影日時がありません".into())
}
