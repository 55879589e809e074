use crate::error::AppError;
use crate::models::fs_types::CandidateFile;
use std::path::Path;
use walkdir::WalkDir;

/// Stand-in for the platform file picker: maps an extension to the media
/// type the picker would declare for the file.
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Open a single file as a picker-style handle. Single-file opens carry no
/// folder-qualified name.
pub fn open_file(path: &Path) -> Result<CandidateFile, AppError> {
    if !path.is_file() {
        return Err(format!("Not a file: {}", path.display()).into());
    }

    let name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    Ok(CandidateFile {
        name,
        relative_path: None,
        path: path.to_path_buf(),
        media_type: media_type_for(path).to_string(),
    })
}

/// Recursively list a folder the way a directory picker would: every regular
/// file, with both its bare name and its '/'-separated path relative to the
/// selected root. Output is sorted by relative path so runs are
/// deterministic.
pub fn scan_folder(root: &Path) -> Result<Vec<CandidateFile>, AppError> {
    if !root.is_dir() {
        return Err(format!("Not a folder: {}", root.display()).into());
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let relative = path
            .strip_prefix(root)
            .map_err(|e| AppError {
                message: format!("Failed to relativize {}: {}", path.display(), e),
            })?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        files.push(CandidateFile {
            name,
            relative_path: Some(relative),
            path: path.to_path_buf(),
            media_type: media_type_for(path).to_string(),
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "telltale-fs-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn media_types_follow_extensions() {
        assert_eq!(media_type_for(Path::new("abs.png")), "image/png");
        assert_eq!(media_type_for(Path::new("abs.PNG")), "image/png");
        assert_eq!(media_type_for(Path::new("photo.JPG")), "image/jpeg");
        assert_eq!(
            media_type_for(Path::new("notes.txt")),
            "application/octet-stream"
        );
        assert_eq!(
            media_type_for(Path::new("no_extension")),
            "application/octet-stream"
        );
    }

    #[test]
    fn scan_folder_preserves_relative_paths() {
        let root = scratch_dir("scan");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.png"), b"x").unwrap();
        fs::write(root.join("sub").join("b.png"), b"x").unwrap();

        let files = scan_folder(&root).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "a.png");
        assert_eq!(files[0].relative_path.as_deref(), Some("a.png"));
        assert_eq!(files[1].name, "b.png");
        assert_eq!(files[1].relative_path.as_deref(), Some("sub/b.png"));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn open_file_rejects_missing_paths() {
        let root = scratch_dir("open");
        assert!(open_file(&root.join("missing.png")).is_err());

        fs::write(root.join("one.png"), b"x").unwrap();
        let file = open_file(&root.join("one.png")).unwrap();
        assert_eq!(file.name, "one.png");
        assert_eq!(file.relative_path, None);
        assert_eq!(file.media_type, "image/png");
        assert_eq!(file.upload_name(), "one.png");

        let _ = fs::remove_dir_all(&root);
    }
}
