//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：创建日志文件、打印启动信息、构建判分服务
//! 2. **加载输入**：读取配置中的二维码内容和答题卡目录
//! 3. **驱动会话**：通过 `SessionDriver` 依次发送扫码、添加图片、提交指令
//! 4. **输出成绩**：打印成绩摘要并追加到日志文件

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppResult, WorkflowError};
use crate::models::{self, GradingResult};
use crate::orchestrator::session_driver::SessionDriver;
use crate::services::{Grader, MockGrader};
use crate::utils::logging;
use crate::workflow::{Command, Notice, ScanFlow, Severity, WorkflowEvent};

/// 应用主结构
pub struct App {
    config: Config,
    grader: Arc<dyn Grader>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> AppResult<Self> {
        logging::init_log_file(&config.output_log_file)?;
        logging::log_startup(config.grading_latency_ms, config.scanner_fps);

        let grader: Arc<dyn Grader> = Arc::new(MockGrader::from_config(&config));
        Ok(Self::with_grader(config, grader))
    }

    /// 使用指定的判分服务（不创建日志文件）
    pub fn with_grader(config: Config, grader: Arc<dyn Grader>) -> Self {
        Self { config, grader }
    }

    /// 运行一次完整的扫码判分
    ///
    /// # 返回
    /// 判分成功时返回成绩；缺少输入或判分失败时返回 `None`
    pub async fn run(&self) -> AppResult<Option<GradingResult>> {
        let Some(payload) = self.config.qr_payload.clone() else {
            warn!("⚠️ 未配置二维码内容 (SCAN_QR_PAYLOAD)，程序结束");
            return Ok(None);
        };

        info!("\n📁 正在加载答题卡: {}", self.config.sheet_folder);
        let files = models::load_sheet_folder(&self.config.sheet_folder).await?;
        if files.is_empty() {
            warn!("⚠️ 答题卡目录为空，将按无图片提交");
        } else {
            info!("📄 找到 {} 个文件", files.len());
        }

        let flow = ScanFlow::from_config(&self.config, Arc::clone(&self.grader));
        let mut session = SessionDriver::spawn(flow, None);

        session.send(Command::SubmitQr(payload)).await?;
        session.send(Command::AddFromFiles(files)).await?;
        session.send(Command::SubmitImages).await?;

        // 等到出现结论性的提示为止
        while let Some(event) = session.next_event().await {
            match event {
                WorkflowEvent::Notice(notice) => {
                    let finished = matches!(
                        notice,
                        Notice::InvalidQr(_)
                            | Notice::GradingComplete { .. }
                            | Notice::GradingFailed { .. }
                    );
                    log_notice(&notice);
                    if finished {
                        break;
                    }
                }
                WorkflowEvent::CommandRejected { reason } => {
                    warn!("⚠️ 指令未执行: {}", reason);
                }
                WorkflowEvent::PhaseChanged { from, to } => info!("📍 {} → {}", from, to),
                WorkflowEvent::Navigate(intent) => info!("🧭 {:?}", intent),
            }
        }

        let (mut flow, _) = session.shutdown().await?;
        let outcome = match (flow.session().descriptor(), flow.session().result()) {
            (Some(descriptor), Some(result)) => {
                logging::print_final_stats(descriptor, result, &self.config.output_log_file);
                logging::append_session_record(&self.config.output_log_file, descriptor, result)?;
                Some(result.clone())
            }
            (None, _) => {
                error!("❌ {}", WorkflowError::MissingDescriptor);
                None
            }
            (Some(descriptor), None) => {
                error!("[测试 {}] ❌ 未得到成绩", descriptor.test_id());
                None
            }
        };

        flow.reset().await;
        Ok(outcome)
    }
}

fn log_notice(notice: &Notice) {
    match notice.severity() {
        Severity::Info => {
            info!("🔔 {} - {}", notice.title(), notice.description())
        }
        Severity::Destructive => {
            warn!("🔔 {} - {}", notice.title(), notice.description())
        }
    }
}
