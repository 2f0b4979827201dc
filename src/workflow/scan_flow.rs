//! 扫码判分流程 - 流程层
//!
//! 核心职责：按顺序推进一次扫码判分会话
//!
//! 流程顺序：
//! 1. 等待扫码 → 解析二维码 → 拍摄答题卡
//! 2. 拍摄答题卡 → 提交 → 判分中
//! 3. 判分中 → 成功：查看成绩 / 失败：回到拍摄答题卡（保留图片）
//! 4. 任意阶段 → 重置 → 等待扫码

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, DeviceError, GradingError, WorkflowError};
use crate::infrastructure::QrScanner;
use crate::models::{CameraFrame, GradingResult, SelectedFile, TestDescriptor};
use crate::services::camera::{self, Camera, CameraDevice};
use crate::services::{qr_parser, Grader};
use crate::workflow::events::{NavigationIntent, Notice, WorkflowEvent};
use crate::workflow::session::{Phase, WorkflowSession};

/// 界面层发给流程的指令，按到达顺序逐条处理
#[derive(Debug, Clone)]
pub enum Command {
    /// 直接提交一段扫码文本（例如从剪贴板或测试输入）
    SubmitQr(String),
    StartScanner,
    SwitchCamera,
    StopScanner,
    /// 关闭扫码页
    CloseScanner,
    /// 用摄像头拍一张答题卡
    CaptureFromCamera,
    AddFromCamera(CameraFrame),
    AddFromFiles(Vec<SelectedFile>),
    RemoveImage(usize),
    SubmitImages,
    ShowDetails,
    ScanAnother,
    Reset,
}

/// 扫码判分流程
///
/// - 独占会话数据，所有修改都在这里发生
/// - 不检查界面是否禁用了按钮，每个操作自己校验所处阶段
/// - 判分后端通过 `Grader` 注入，可以替换为真实服务
pub struct ScanFlow {
    session: WorkflowSession,
    grader: Arc<dyn Grader>,
    camera_keywords: Vec<String>,
    scan_interval: Duration,
    scanner: Option<QrScanner>,
    cameras: Vec<CameraDevice>,
    events: Vec<WorkflowEvent>,
}

impl ScanFlow {
    /// 使用默认配置创建流程
    pub fn new(grader: Arc<dyn Grader>) -> Self {
        Self::from_config(&Config::default(), grader)
    }

    pub fn from_config(config: &Config, grader: Arc<dyn Grader>) -> Self {
        Self {
            session: WorkflowSession::new(),
            grader,
            camera_keywords: config.preferred_camera_keywords.clone(),
            scan_interval: config.scan_interval(),
            scanner: None,
            cameras: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn session(&self) -> &WorkflowSession {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    /// 取出尚未被消费的事件
    pub fn drain_events(&mut self) -> Vec<WorkflowEvent> {
        std::mem::take(&mut self.events)
    }

    // ========== 阶段 1: 扫码 ==========

    /// 提交扫到的文本
    ///
    /// 解析失败时停留在等待扫码阶段，返回解析错误；
    /// 解析成功时先停止扫码器、释放摄像头，再进入拍摄答题卡
    pub async fn submit_qr(&mut self, raw_text: &str) -> AppResult<&TestDescriptor> {
        self.expect_phase(Phase::AwaitingQr, "submit_qr")?;

        let descriptor = match qr_parser::parse(raw_text) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                debug!("二维码内容无效 ({}): {}", e, truncate(raw_text, 60));
                self.notify(Notice::InvalidQr(e.clone()));
                return Err(e.into());
            }
        };

        info!("[测试 {}] ✓ 二维码解析成功 {}", descriptor.test_id(), descriptor);
        self.notify(Notice::QrScanned {
            test_id: descriptor.test_id().to_string(),
            question_count: descriptor.question_count(),
            topic: descriptor.topic().map(str::to_string),
        });
        self.stop_scanner().await;
        self.transition(Phase::CapturingSheet);
        Ok(self.session.store_descriptor(descriptor))
    }

    /// 打开首选摄像头并开始扫码
    pub async fn start_scanner(&mut self, camera: &dyn Camera) -> AppResult<()> {
        self.expect_phase(Phase::AwaitingQr, "start_scanner")?;
        if self.scanner.is_some() {
            return Ok(());
        }

        let devices = match camera.devices().await {
            Ok(devices) => devices,
            Err(e) => return Err(self.camera_unavailable(e)),
        };
        let device_id = match camera::select_preferred(&devices, &self.camera_keywords) {
            Ok(device) => device.id.clone(),
            Err(e) => return Err(self.camera_unavailable(e)),
        };
        self.cameras = devices;

        self.open_scanner(camera, &device_id).await
    }

    /// 切换到下一个摄像头（只有一个摄像头时不做任何事）
    pub async fn switch_camera(&mut self, camera: &dyn Camera) -> AppResult<()> {
        self.expect_phase(Phase::AwaitingQr, "switch_camera")?;
        if self.cameras.len() < 2 {
            return Ok(());
        }
        let Some(current) = self.scanner.as_ref().map(|s| s.device_id().to_string()) else {
            return Ok(());
        };
        let Some(next_id) = camera::next_device(&self.cameras, &current).map(|d| d.id.clone())
        else {
            return Ok(());
        };

        self.stop_scanner().await;
        info!("🔄 切换摄像头: {} → {}", current, next_id);
        self.open_scanner(camera, &next_id).await
    }

    async fn open_scanner(&mut self, camera: &dyn Camera, device_id: &str) -> AppResult<()> {
        match QrScanner::start(camera, device_id, self.scan_interval).await {
            Ok(scanner) => {
                self.scanner = Some(scanner);
                Ok(())
            }
            Err(e) => Err(self.camera_unavailable(e)),
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanner.is_some()
    }

    /// 当前扫码使用的设备
    pub fn scanning_device(&self) -> Option<&str> {
        self.scanner.as_ref().map(|s| s.device_id())
    }

    /// 等待扫码器给出下一条文本；没有在扫码时永远挂起
    pub async fn next_scanned_payload(&mut self) -> Option<String> {
        match self.scanner.as_mut() {
            Some(scanner) => scanner.next_payload().await,
            None => std::future::pending().await,
        }
    }

    /// 处理扫码器给出的一条结果
    ///
    /// # 返回
    /// - `Ok(true)`: 解析成功，扫码器已停止
    /// - `Ok(false)`: 内容无效，继续扫码
    pub async fn handle_scanned_payload(&mut self, payload: Option<String>) -> AppResult<bool> {
        let Some(text) = payload else {
            // 视频流中途结束
            self.stop_scanner().await;
            return Err(self.camera_unavailable(DeviceError::StreamEnded));
        };

        let outcome = self.submit_qr(&text).await.map(|_| ());
        match outcome {
            Ok(()) => Ok(true),
            Err(AppError::Parse(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// 持续扫码直到扫到有效的试卷码
    pub async fn scan_qr(&mut self) -> AppResult<TestDescriptor> {
        if self.scanner.is_none() {
            return Err(AppError::Device(DeviceError::StreamEnded));
        }
        loop {
            let payload = self.next_scanned_payload().await;
            if self.handle_scanned_payload(payload).await? {
                return self
                    .session
                    .descriptor()
                    .cloned()
                    .ok_or(AppError::Workflow(WorkflowError::MissingDescriptor));
            }
        }
    }

    /// 停止扫码并等待摄像头释放
    pub async fn stop_scanner(&mut self) {
        if let Some(mut scanner) = self.scanner.take() {
            scanner.stop().await;
        }
    }

    /// 关闭扫码页：停止扫码、丢弃会话
    pub async fn close_scanner(&mut self) -> NavigationIntent {
        self.reset().await;
        self.navigate(NavigationIntent::ExitScanner)
    }

    // ========== 阶段 2: 拍摄答题卡 ==========

    /// 添加摄像头拍下的一帧，无法识别为图片时返回 `Ok(None)`
    pub fn add_from_camera(&mut self, frame: CameraFrame) -> AppResult<Option<u64>> {
        self.expect_phase(Phase::CapturingSheet, "add_from_camera")?;
        Ok(self.session.images_mut().add_from_camera(frame))
    }

    /// 添加选中的文件，返回接收的数量（非图片文件被忽略）
    pub fn add_from_files(&mut self, files: Vec<SelectedFile>) -> AppResult<usize> {
        self.expect_phase(Phase::CapturingSheet, "add_from_files")?;
        let offered = files.len();
        let accepted = self.session.images_mut().add_from_files(files);
        if accepted < offered {
            debug!("忽略了 {} 个非图片文件", offered - accepted);
        }
        Ok(accepted)
    }

    /// 用摄像头拍一张答题卡
    ///
    /// 摄像头不可用时发出提示并返回 `Ok(None)`，用户可以改为上传文件
    pub async fn capture_from_camera(&mut self, camera: &dyn Camera) -> AppResult<Option<u64>> {
        self.expect_phase(Phase::CapturingSheet, "capture_from_camera")?;

        match camera::capture_single_frame(camera, &self.camera_keywords).await {
            Ok(frame) => self.add_from_camera(frame),
            Err(e) => {
                warn!("⚠️ 无法使用摄像头拍摄答题卡: {}", e);
                self.notify(Notice::CameraUnavailable(e));
                Ok(None)
            }
        }
    }

    pub fn remove_image(&mut self, index: usize) -> AppResult<()> {
        self.expect_phase(Phase::CapturingSheet, "remove_image")?;
        self.session.images_mut().remove(index)?;
        Ok(())
    }

    // ========== 阶段 3: 判分 ==========

    /// 进入判分中
    ///
    /// 没有图片时直接判为失败，停留在拍摄答题卡阶段
    pub fn begin_grading(&mut self) -> AppResult<()> {
        self.expect_phase(Phase::CapturingSheet, "submit_images")?;
        if self.session.descriptor().is_none() {
            return Err(WorkflowError::MissingDescriptor.into());
        }
        if self.session.images().is_empty() {
            let e = GradingError::NoImages;
            warn!("⚠️ {}", e);
            self.notify(Notice::GradingFailed {
                reason: e.to_string(),
            });
            return Err(e.into());
        }

        self.transition(Phase::Grading);
        Ok(())
    }

    /// 判分成功
    ///
    /// 结果题数与试卷不符时按判分失败处理
    pub fn grading_succeeded(&mut self, result: GradingResult) -> AppResult<&GradingResult> {
        self.expect_phase(Phase::Grading, "grading_succeeded")?;
        let Some(descriptor) = self.session.descriptor() else {
            return Err(WorkflowError::MissingDescriptor.into());
        };

        if result.question_count() != descriptor.question_count() {
            let e = GradingError::InconsistentResult(format!(
                "试卷 {} 题，结果 {} 题",
                descriptor.question_count(),
                result.question_count()
            ));
            return Err(self.grading_failed(e));
        }

        info!(
            "[测试 {}] ✅ 成绩: {}",
            descriptor.test_id(),
            result.summary()
        );
        self.notify(Notice::GradingComplete {
            correct: result.correct_count(),
            total: result.question_count(),
        });
        self.transition(Phase::ShowingResults);
        Ok(self.session.store_result(result))
    }

    /// 判分失败：回到拍摄答题卡，图片保留，不自动重试
    pub fn grading_failed(&mut self, error: GradingError) -> AppError {
        if let Err(e) = self.expect_phase(Phase::Grading, "grading_failed") {
            return e;
        }
        error!("❌ 判分失败: {}", error);
        self.notify(Notice::GradingFailed {
            reason: error.to_string(),
        });
        self.transition(Phase::CapturingSheet);
        error.into()
    }

    /// 提交答题卡并等待判分
    pub async fn submit_images(&mut self) -> AppResult<&GradingResult> {
        self.begin_grading()?;

        let grader = Arc::clone(&self.grader);
        let outcome = match self.session.descriptor() {
            Some(descriptor) => {
                info!(
                    "[测试 {}] 📤 提交 {} 页答题卡判分...",
                    descriptor.test_id(),
                    self.session.images().len()
                );
                grader.grade(descriptor, self.session.images().list()).await
            }
            None => Err(GradingError::Backend("会话中没有试卷信息".to_string())),
        };

        match outcome {
            Ok(result) => self.grading_succeeded(result),
            Err(e) => Err(self.grading_failed(e)),
        }
    }

    // ========== 阶段 4: 查看成绩 ==========

    /// 查看详细解析
    pub fn show_details(&mut self) -> AppResult<NavigationIntent> {
        self.expect_phase(Phase::ShowingResults, "show_details")?;
        let test_id = self
            .session
            .descriptor()
            .map(|d| d.test_id().to_string())
            .ok_or(WorkflowError::MissingDescriptor)?;
        Ok(self.navigate(NavigationIntent::ShowDetails { test_id }))
    }

    /// 再扫一份：重置后回到等待扫码
    pub async fn scan_another(&mut self) -> NavigationIntent {
        self.reset().await;
        self.navigate(NavigationIntent::ScanAnother)
    }

    /// 任意阶段都可以调用：停止扫码、释放所有图片、回到等待扫码
    pub async fn reset(&mut self) {
        self.stop_scanner().await;
        self.cameras.clear();

        let from = self.session.phase();
        self.session.clear();
        if from != Phase::AwaitingQr {
            info!("↩️ 会话已重置 ({} → {})", from, Phase::AwaitingQr);
            self.events.push(WorkflowEvent::PhaseChanged {
                from,
                to: Phase::AwaitingQr,
            });
        }
    }

    /// 按指令执行一步
    ///
    /// 需要摄像头的指令在没有摄像头时按"设备上没有摄像头"处理
    pub async fn apply(&mut self, command: Command, camera: Option<&dyn Camera>) -> AppResult<()> {
        debug!("处理指令: {:?} (阶段: {})", CommandName(&command), self.phase());
        match command {
            Command::SubmitQr(text) => self.submit_qr(&text).await.map(|_| ()),
            Command::StartScanner => match camera {
                Some(camera) => self.start_scanner(camera).await,
                None => Err(self.camera_unavailable(DeviceError::NoCamera)),
            },
            Command::SwitchCamera => match camera {
                Some(camera) => self.switch_camera(camera).await,
                None => Ok(()),
            },
            Command::StopScanner => {
                self.stop_scanner().await;
                Ok(())
            }
            Command::CloseScanner => {
                self.close_scanner().await;
                Ok(())
            }
            Command::CaptureFromCamera => match camera {
                Some(camera) => self.capture_from_camera(camera).await.map(|_| ()),
                None => {
                    self.expect_phase(Phase::CapturingSheet, "capture_from_camera")?;
                    self.notify(Notice::CameraUnavailable(DeviceError::NoCamera));
                    Ok(())
                }
            },
            Command::AddFromCamera(frame) => self.add_from_camera(frame).map(|_| ()),
            Command::AddFromFiles(files) => self.add_from_files(files).map(|_| ()),
            Command::RemoveImage(index) => self.remove_image(index),
            Command::SubmitImages => self.submit_images().await.map(|_| ()),
            Command::ShowDetails => self.show_details().map(|_| ()),
            Command::ScanAnother => {
                self.scan_another().await;
                Ok(())
            }
            Command::Reset => {
                self.reset().await;
                Ok(())
            }
        }
    }

    // ========== 内部辅助方法 ==========

    fn expect_phase(&self, expected: Phase, action: &'static str) -> AppResult<()> {
        let phase = self.session.phase();
        if phase != expected {
            debug!("拒绝操作 {}: 当前阶段 {}", action, phase);
            return Err(AppError::invalid_transition(phase, action));
        }
        Ok(())
    }

    fn transition(&mut self, to: Phase) {
        let from = self.session.phase();
        self.session.set_phase(to);
        debug!("阶段: {} → {}", from, to);
        self.events.push(WorkflowEvent::PhaseChanged { from, to });
    }

    fn notify(&mut self, notice: Notice) {
        self.events.push(WorkflowEvent::Notice(notice));
    }

    fn navigate(&mut self, intent: NavigationIntent) -> NavigationIntent {
        self.events.push(WorkflowEvent::Navigate(intent.clone()));
        intent
    }

    fn camera_unavailable(&mut self, error: DeviceError) -> AppError {
        warn!("⚠️ 摄像头不可用: {}", error);
        self.notify(Notice::CameraUnavailable(error.clone()));
        error.into()
    }
}

/// 日志里只打印指令名，不打印图片字节
struct CommandName<'a>(&'a Command);

impl std::fmt::Debug for CommandName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self.0 {
            Command::SubmitQr(_) => "SubmitQr",
            Command::StartScanner => "StartScanner",
            Command::SwitchCamera => "SwitchCamera",
            Command::StopScanner => "StopScanner",
            Command::CloseScanner => "CloseScanner",
            Command::CaptureFromCamera => "CaptureFromCamera",
            Command::AddFromCamera(_) => "AddFromCamera",
            Command::AddFromFiles(_) => "AddFromFiles",
            Command::RemoveImage(_) => "RemoveImage",
            Command::SubmitImages => "SubmitImages",
            Command::ShowDetails => "ShowDetails",
            Command::ScanAnother => "ScanAnother",
            Command::Reset => "Reset",
        };
        f.write_str(name)
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    crate::utils::logging::truncate_text(text, max_len)
}
