use crate::error::AppError;
use crate::models::fs_types::{CandidateFile, PreviewImage};
use crate::models::predict_types::PredictionResult;
use base64::Engine;
use image::imageops::FilterType;
use image::ImageReader;
use std::io::Cursor;
use std::path::Path;

const PREVIEW_SIZE: u32 = 160;

/// Match a server-returned filename back to the originating local file.
///
/// Folder selections preserve a path-qualified name alongside the bare name,
/// and the server may echo either form, so both are candidate keys. First
/// match by equality wins; duplicate basenames across subfolders are not
/// disambiguated further.
pub fn match_candidate<'a>(
    filename: &str,
    files: &'a [CandidateFile],
) -> Option<&'a CandidateFile> {
    files
        .iter()
        .find(|f| f.name == filename || f.relative_path.as_deref() == Some(filename))
}

/// Re-encode a local image to an embeddable inline PNG data URI, bounded to
/// thumbnail size.
pub fn encode_inline_png(path: &Path) -> Result<String, AppError> {
    let mut img = ImageReader::open(path)
        .map_err(|e| AppError {
            message: format!("Failed to open image {}: {}", path.display(), e),
        })?
        .decode()
        .map_err(|e| AppError {
            message: format!("Failed to decode image {}: {}", path.display(), e),
        })?;

    if img.width() > PREVIEW_SIZE || img.height() > PREVIEW_SIZE {
        img = img.resize(PREVIEW_SIZE, PREVIEW_SIZE, FilterType::Triangle);
    }

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;

    let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:image/png;base64,{}", b64))
}

/// Bind a result to a fresh transient preview, or `None` when no local file
/// matches. Each call yields a new owned image; the caller releases the
/// previous one by dropping it.
pub fn bind(result: &PredictionResult, files: &[CandidateFile]) -> Option<PreviewImage> {
    let file = match_candidate(&result.filename, files)?;

    match encode_inline_png(&file.path) {
        Ok(uri) => Some(PreviewImage::new(uri)),
        Err(e) => {
            eprintln!("Failed to build preview for {}: {}", result.filename, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn candidate(name: &str, relative: Option<&str>) -> CandidateFile {
        CandidateFile {
            name: name.to_string(),
            relative_path: relative.map(str::to_string),
            path: PathBuf::from(name),
            media_type: "image/png".to_string(),
        }
    }

    #[test]
    fn matches_bare_name() {
        let files = vec![candidate("abs.png", Some("icons/abs.png"))];
        assert!(match_candidate("abs.png", &files).is_some());
    }

    #[test]
    fn matches_relative_path() {
        let files = vec![candidate("abs.png", Some("icons/abs.png"))];
        let hit = match_candidate("icons/abs.png", &files).unwrap();
        assert_eq!(hit.name, "abs.png");
    }

    #[test]
    fn first_match_wins_on_duplicate_basenames() {
        let files = vec![
            candidate("abs.png", Some("day/abs.png")),
            candidate("abs.png", Some("night/abs.png")),
        ];
        let hit = match_candidate("abs.png", &files).unwrap();
        assert_eq!(hit.relative_path.as_deref(), Some("day/abs.png"));
    }

    #[test]
    fn no_match_yields_none() {
        let files = vec![candidate("abs.png", None)];
        assert!(match_candidate("esp.png", &files).is_none());

        let result = PredictionResult {
            filename: "esp.png".to_string(),
            prediction: "ESP".to_string(),
            confidence: 0.5,
            status: None,
            top5: None,
        };
        assert!(bind(&result, &files).is_none());
    }

    #[test]
    fn encodes_a_real_png_to_a_data_uri() {
        let dir = std::env::temp_dir().join(format!("telltale-preview-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dot.png");

        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([255, 0, 0]));
        img.save(&path).unwrap();

        let uri = encode_inline_png(&path).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));

        let _ = fs::remove_dir_all(&dir);
    }
}
