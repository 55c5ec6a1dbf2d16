use crate::error::{Result, TacoSortError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub file_name: String,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// 画像拡張子か（大文字小文字は区別しない）
pub fn is_image_extension(ext: &str) -> bool {
    let lower = ext.to_lowercase();
    IMAGE_EXTENSIONS.contains(&lower.as_str())
}

/// フォルダ直下の画像を列挙（ファイル名順）
pub fn scan_folder(folder: &Path) -> Result<Vec<ImageInfo>> {
    scan_folder_with(folder, is_image_extension)
}

/// フォルダ直下のJPEG画像を列挙（分割済みデータセット用）
pub fn scan_jpegs(folder: &Path) -> Result<Vec<ImageInfo>> {
    scan_folder_with(folder, |ext| {
        let lower = ext.to_lowercase();
        lower == "jpg" || lower == "jpeg"
    })
}

fn scan_folder_with(folder: &Path, accept: impl Fn(&str) -> bool) -> Result<Vec<ImageInfo>> {
    if !folder.is_dir() {
        return Err(TacoSortError::FolderNotFound(folder.display().to_string()));
    }

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

        if let Some(ext) = path.extension() {
            if accept(&ext.to_string_lossy()) {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();

                images.push(ImageInfo {
                    path: path.to_path_buf(),
                    file_name,
                });
            }
        }
    }

    // ファイル名でソート
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_is_image_extension() {
        assert!(is_image_extension("jpg"));
        assert!(is_image_extension("JPG"));
        assert!(is_image_extension("jpeg"));
        assert!(is_image_extension("Png"));
        assert!(!is_image_extension("txt"));
        assert!(!is_image_extension("gif"));
    }

    #[test]
    fn test_scan_folder_not_found() {
        let result = scan_folder(Path::new("/nonexistent/folder"));
        assert!(matches!(result, Err(TacoSortError::FolderNotFound(_))));
    }

    #[test]
    fn test_scan_folder_with_images() {
        let dir = tempdir().unwrap();

        File::create(dir.path().join("test1.jpg")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.path().join("test2.JPG")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.path().join("test3.png")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.path().join("readme.txt")).unwrap().write_all(b"text").unwrap();
        std::fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let result = scan_folder(dir.path()).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].file_name, "test1.jpg");
        assert_eq!(result[1].file_name, "test2.JPG");
        assert_eq!(result[2].file_name, "test3.png");

        let jpegs = scan_jpegs(dir.path()).unwrap();
        assert_eq!(jpegs.len(), 2);
    }

    #[test]
    fn test_images_sorted_by_filename() {
        let dir = tempdir().unwrap();

        File::create(dir.path().join("c.jpg")).unwrap();
        File::create(dir.path().join("a.jpg")).unwrap();
        File::create(dir.path().join("b.jpg")).unwrap();

        let result = scan_folder(dir.path()).unwrap();
        let names: Vec<_> = result.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "c.jpg"]);
    }
}
