//! 摄像头能力 - 业务能力层
//!
//! 摄像头和扫码库都是外部协作方，这里只定义接口、设备选择规则和带自动释放的租用对象

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::DeviceError;
use crate::models::CameraFrame;

/// 摄像头设备
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub id: String,
    pub label: String,
}

impl CameraDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// 已打开的视频流
///
/// 解码由第三方扫码库完成，这里只接收它给出的文本
pub trait VideoStream: Send {
    /// 对当前画面做一次解码尝试，没有识别到二维码时返回 `None`
    fn try_decode(&mut self) -> Result<Option<String>, DeviceError>;

    /// 拍下当前画面
    fn capture_frame(&mut self) -> Result<CameraFrame, DeviceError>;

    /// 停止视频流并释放设备
    fn stop(&mut self);
}

/// 摄像头
#[async_trait]
pub trait Camera: Send + Sync {
    /// 列出可用设备；无权限时返回 `DeviceError::PermissionDenied`
    async fn devices(&self) -> Result<Vec<CameraDevice>, DeviceError>;

    /// 打开指定设备的视频流
    async fn open(&self, device_id: &str) -> Result<Box<dyn VideoStream>, DeviceError>;
}

/// 摄像头租用
///
/// 持有视频流，离开作用域时（包括出错和取消）一定会停止视频流
pub struct CameraLease {
    device_id: String,
    stream: Option<Box<dyn VideoStream>>,
}

impl CameraLease {
    pub async fn acquire(camera: &dyn Camera, device_id: &str) -> Result<Self, DeviceError> {
        let stream = camera.open(device_id).await?;
        info!("📷 已打开摄像头: {}", device_id);
        Ok(Self {
            device_id: device_id.to_string(),
            stream: Some(stream),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn try_decode(&mut self) -> Result<Option<String>, DeviceError> {
        match self.stream.as_mut() {
            Some(stream) => stream.try_decode(),
            None => Err(DeviceError::StreamEnded),
        }
    }

    pub fn capture_frame(&mut self) -> Result<CameraFrame, DeviceError> {
        match self.stream.as_mut() {
            Some(stream) => stream.capture_frame(),
            None => Err(DeviceError::StreamEnded),
        }
    }

    /// 主动释放（与 drop 效果相同）
    pub fn release(mut self) {
        self.stop_stream();
    }

    fn stop_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            info!("📷 已关闭摄像头: {}", self.device_id);
        }
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

/// 选择摄像头：标签包含关键字（不区分大小写）的设备优先，否则取第一个
pub fn select_preferred<'a>(
    devices: &'a [CameraDevice],
    keywords: &[String],
) -> Result<&'a CameraDevice, DeviceError> {
    let preferred = devices.iter().find(|d| {
        let label = d.label.to_lowercase();
        keywords.iter().any(|k| label.contains(&k.to_lowercase()))
    });

    match preferred.or_else(|| devices.first()) {
        Some(device) => {
            debug!("选择摄像头: {} ({})", device.label, device.id);
            Ok(device)
        }
        None => Err(DeviceError::NoCamera),
    }
}

/// 切换到下一个设备（循环）；当前设备不在列表中时从第一个开始
pub fn next_device<'a>(devices: &'a [CameraDevice], current_id: &str) -> Option<&'a CameraDevice> {
    if devices.is_empty() {
        return None;
    }
    let next = match devices.iter().position(|d| d.id == current_id) {
        Some(index) => (index + 1) % devices.len(),
        None => 0,
    };
    devices.get(next)
}

/// 拍一张答题卡：打开首选摄像头，拍一帧后立即关闭
pub async fn capture_single_frame(
    camera: &dyn Camera,
    keywords: &[String],
) -> Result<CameraFrame, DeviceError> {
    let devices = camera.devices().await?;
    let device = select_preferred(&devices, keywords)?;
    let mut lease = CameraLease::acquire(camera, &device.id).await?;
    let frame = lease.capture_frame();
    lease.release();
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<CameraDevice> {
        vec![
            CameraDevice::new("cam-1", "Front Camera"),
            CameraDevice::new("cam-2", "Back Camera (wide)"),
            CameraDevice::new("cam-3", "USB Webcam"),
        ]
    }

    fn keywords() -> Vec<String> {
        vec!["back".to_string(), "rear".to_string()]
    }

    #[test]
    fn test_select_prefers_back_camera() {
        let devices = devices();
        let device = select_preferred(&devices, &keywords()).unwrap();
        assert_eq!(device.id, "cam-2");
    }

    #[test]
    fn test_select_falls_back_to_first() {
        let devices = vec![
            CameraDevice::new("a", "Integrated"),
            CameraDevice::new("b", "External"),
        ];
        assert_eq!(select_preferred(&devices, &keywords()).unwrap().id, "a");
        assert_eq!(select_preferred(&[], &keywords()), Err(DeviceError::NoCamera));
    }

    #[test]
    fn test_next_device_wraps() {
        let devices = devices();
        assert_eq!(next_device(&devices, "cam-1").unwrap().id, "cam-2");
        assert_eq!(next_device(&devices, "cam-3").unwrap().id, "cam-1");
        assert_eq!(next_device(&devices, "unknown").unwrap().id, "cam-1");
        assert!(next_device(&[], "cam-1").is_none());
    }
}
