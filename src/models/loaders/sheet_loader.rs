use crate::error::{AppError, AppResult, FileError};
use crate::models::image::SelectedFile;
use futures::stream::{self, StreamExt};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tokio::fs;

const READ_CONCURRENCY: usize = 4;

/// 读取单个文件，MIME 类型按扩展名推断（与文件选择框的行为一致）
pub async fn load_selected_file(path: &Path) -> AppResult<SelectedFile> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;

    let mime_type = ImageFormat::from_path(path)
        .ok()
        .map(|format| format.to_mime_type().to_string());

    let name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    Ok(SelectedFile::new(name, mime_type, bytes))
}

/// 读取文件夹中的所有文件，按文件名排序（页码顺序）
///
/// 不在这里过滤非图片文件，过滤由 `ImageCaptureStore` 负责
pub async fn load_sheet_folder(folder_path: &str) -> AppResult<Vec<SelectedFile>> {
    let folder = PathBuf::from(folder_path);

    if !folder.is_dir() {
        return Err(AppError::File(FileError::DirectoryNotFound {
            path: folder_path.to_string(),
        }));
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?
    {
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    // 并发读取，结果保持文件名顺序
    let mut loaded = stream::iter(paths)
        .map(|path| async move {
            let outcome = load_selected_file(&path).await;
            (path, outcome)
        })
        .buffered(READ_CONCURRENCY);

    let mut files = Vec::new();
    while let Some((path, outcome)) = loaded.next().await {
        match outcome {
            Ok(file) => {
                tracing::debug!("已读取: {} ({} 字节)", file.name, file.bytes.len());
                files.push(file);
            }
            Err(e) => {
                tracing::warn!("读取文件失败 {}: {}", path.display(), e);
            }
        }
    }

    tracing::info!("从 {} 读取到 {} 个文件", folder_path, files.len());
    Ok(files)
}
