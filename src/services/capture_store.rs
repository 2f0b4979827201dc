//! 答题卡图片存储 - 业务能力层
//!
//! 管理一张答题卡已拍摄/选择的各页图片，负责预览句柄的申请与释放

use tracing::{debug, info, warn};

use crate::error::CaptureError;
use crate::infrastructure::PreviewRegistry;
use crate::models::image::sniff_image;
use crate::models::{CameraFrame, CapturedImage, ImageSource, SelectedFile};

/// 答题卡图片存储
///
/// 职责：
/// - 按添加顺序保存图片
/// - 只接收可识别的图片，其余输入直接忽略
/// - 移除图片时同时释放它的预览句柄，清空或销毁时全部释放
#[derive(Debug, Default)]
pub struct ImageCaptureStore {
    images: Vec<CapturedImage>,
    previews: PreviewRegistry,
    next_id: u64,
}

impl ImageCaptureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加摄像头拍下的一帧
    ///
    /// # 返回
    /// 接收时返回图片编号，无法识别为图片时返回 `None`
    pub fn add_from_camera(&mut self, frame: CameraFrame) -> Option<u64> {
        let name = frame.file_name();
        self.push(name, ImageSource::Camera, None, frame.bytes)
    }

    /// 添加一个选中的文件
    pub fn add_from_file(&mut self, file: SelectedFile) -> Option<u64> {
        let SelectedFile {
            name,
            mime_type,
            bytes,
        } = file;
        self.push(name, ImageSource::File, mime_type.as_deref(), bytes)
    }

    /// 批量添加选中的文件，返回接收的数量
    pub fn add_from_files(&mut self, files: impl IntoIterator<Item = SelectedFile>) -> usize {
        files
            .into_iter()
            .filter_map(|file| self.add_from_file(file))
            .count()
    }

    fn push(
        &mut self,
        name: String,
        source: ImageSource,
        declared_mime: Option<&str>,
        bytes: Vec<u8>,
    ) -> Option<u64> {
        let Some(format) = sniff_image(&bytes, declared_mime) else {
            debug!("忽略非图片输入: {} ({:?})", name, declared_mime);
            return None;
        };

        self.next_id += 1;
        let id = self.next_id;
        let preview = self.previews.mint();
        debug!("添加第 {} 页: {} [{:?}] 预览 {}", self.images.len() + 1, name, format, preview);

        self.images
            .push(CapturedImage::new(id, name, source, format, bytes, preview));
        Some(id)
    }

    /// 移除指定位置的图片并释放其预览句柄，其余图片保持原有顺序
    pub fn remove(&mut self, index: usize) -> Result<(), CaptureError> {
        if index >= self.images.len() {
            return Err(CaptureError::IndexOutOfRange {
                index,
                len: self.images.len(),
            });
        }

        let image = self.images.remove(index);
        debug!("移除第 {} 页: {}", index + 1, image.name());
        self.previews.release(image.into_preview())
    }

    /// 清空所有图片并释放全部预览句柄
    pub fn clear(&mut self) {
        let count = self.images.len();
        for image in self.images.drain(..) {
            if let Err(e) = self.previews.release(image.into_preview()) {
                warn!("释放预览句柄失败: {}", e);
            }
        }
        if count > 0 {
            info!("🧹 已清空 {} 张答题卡图片", count);
        }
    }

    /// 按顺序查看当前的图片（可以重复调用）
    pub fn list(&self) -> &[CapturedImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// 预览句柄登记表（只读）
    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }
}

impl Drop for ImageCaptureStore {
    fn drop(&mut self) {
        self.clear();
    }
}
