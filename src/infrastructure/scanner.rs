//! 二维码扫描器 - 基础设施层
//!
//! 持有扫码期间的摄像头租用，在后台按固定频率解码，把识别出的文本交给流程层。
//! 扫描器不解释文本内容。

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::DeviceError;
use crate::services::camera::{Camera, CameraLease};

const PAYLOAD_BUFFER: usize = 8;

/// 二维码扫描器
///
/// 职责：
/// - 唯一持有扫码用的摄像头
/// - 随时可以停止，停止后摄像头一定被释放
/// - 不认识试卷 / 题目
pub struct QrScanner {
    device_id: String,
    payloads: mpsc::Receiver<String>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl QrScanner {
    /// 打开摄像头并开始扫描
    ///
    /// # 参数
    /// - `camera`: 摄像头
    /// - `device_id`: 使用的设备
    /// - `interval`: 两次解码尝试的间隔
    pub async fn start(
        camera: &dyn Camera,
        device_id: &str,
        interval: Duration,
    ) -> Result<Self, DeviceError> {
        let lease = CameraLease::acquire(camera, device_id).await?;

        let (tx, rx) = mpsc::channel(PAYLOAD_BUFFER);
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(scan_loop(lease, tx, cancel_token.clone(), interval));

        info!("🔍 开始扫描二维码 (设备: {})", device_id);
        Ok(Self {
            device_id: device_id.to_string(),
            payloads: rx,
            cancel_token,
            handle: Some(handle),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// 等待下一条识别出的文本；扫描已结束时返回 `None`
    pub async fn next_payload(&mut self) -> Option<String> {
        self.payloads.recv().await
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 停止扫描并等待摄像头释放
    pub async fn stop(&mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("扫描任务异常结束: {}", e);
            }
        }
        self.payloads.close();
    }
}

impl Drop for QrScanner {
    fn drop(&mut self) {
        // 后台任务收到取消信号后会释放摄像头
        self.cancel_token.cancel();
    }
}

async fn scan_loop(
    mut lease: CameraLease,
    tx: mpsc::Sender<String>,
    cancel_token: CancellationToken,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("扫描已取消");
                break;
            }
            _ = ticker.tick() => {
                match lease.try_decode() {
                    Ok(Some(text)) => match tx.try_send(text) {
                        Ok(()) => {}
                        // 流程层还没处理完上一条，丢弃这一帧的结果
                        Err(TrySendError::Full(_)) => debug!("扫码结果积压，丢弃一条"),
                        Err(TrySendError::Closed(_)) => break,
                    },
                    Ok(None) => {}
                    Err(e) => {
                        warn!("⚠️ 扫码视频流中断: {}", e);
                        break;
                    }
                }
            }
        }
    }

    lease.release();
}
