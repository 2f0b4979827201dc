//! 答题卡图片相关的数据：摄像头帧、选中的文件和已接收的页面

use image::ImageFormat;

use crate::infrastructure::PreviewHandle;

/// 摄像头拍下的一帧（已编码的图片字节）
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub bytes: Vec<u8>,
    /// 拍摄时间（毫秒时间戳），用于生成文件名
    pub captured_at_ms: i64,
}

impl CameraFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            captured_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// 与网页端一致的文件名: `answer-sheet-<毫秒>.jpg`
    pub fn file_name(&self) -> String {
        format!("answer-sheet-{}.jpg", self.captured_at_ms)
    }
}

/// 用户从文件选择框选中的一个文件
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    /// 浏览器/系统声明的 MIME 类型（可能缺失）
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type,
            bytes,
        }
    }
}

/// 图片来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Camera,
    File,
}

/// 答题卡的一页
///
/// 预览句柄只属于这一张图片，图片被移除时由 `ImageCaptureStore` 释放
#[derive(Debug)]
pub struct CapturedImage {
    id: u64,
    name: String,
    source: ImageSource,
    format: ImageFormat,
    data: Vec<u8>,
    preview: PreviewHandle,
}

impl CapturedImage {
    pub(crate) fn new(
        id: u64,
        name: String,
        source: ImageSource,
        format: ImageFormat,
        data: Vec<u8>,
        preview: PreviewHandle,
    ) -> Self {
        Self {
            id,
            name,
            source,
            format,
            data,
            preview,
        }
    }

    /// 拍摄/选择顺序号
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    pub(crate) fn into_preview(self) -> PreviewHandle {
        self.preview
    }
}

/// 判断字节内容是否为可识别的图片
///
/// 声明了 MIME 类型时必须以 `image/` 开头，且内容本身必须能识别出图片格式
pub fn sniff_image(bytes: &[u8], declared_mime: Option<&str>) -> Option<ImageFormat> {
    if let Some(mime) = declared_mime {
        if !mime.trim().to_ascii_lowercase().starts_with("image/") {
            return None;
        }
    }
    image::guess_format(bytes).ok()
}
