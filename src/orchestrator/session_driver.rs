//! 会话驱动器 - 编排层
//!
//! 把界面层发来的指令和扫码器给出的结果放进同一个循环里串行处理，
//! 保证同一会话上不会有两个操作交错执行。流程产生的事件按发生顺序转发出去。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult, WorkflowError};
use crate::services::Camera;
use crate::workflow::{Command, ScanFlow, WorkflowEvent};

/// 指令队列容量
const COMMAND_BUFFER: usize = 32;

/// 会话驱动器，独占一个 `ScanFlow`
pub struct SessionDriver {
    flow: ScanFlow,
    camera: Option<Arc<dyn Camera>>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedSender<WorkflowEvent>,
}

/// 调用方持有的一端：发送指令、接收事件、结束会话
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: mpsc::UnboundedReceiver<WorkflowEvent>,
    task: JoinHandle<ScanFlow>,
}

impl SessionDriver {
    /// 在后台任务中启动驱动循环
    pub fn spawn(flow: ScanFlow, camera: Option<Arc<dyn Camera>>) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let driver = Self {
            flow,
            camera,
            commands: command_rx,
            events: event_tx,
        };
        let task = tokio::spawn(driver.run());

        SessionHandle {
            commands: command_tx,
            events: event_rx,
            task,
        }
    }

    /// 驱动循环：指令通道关闭后停止扫码并交还流程
    async fn run(mut self) -> ScanFlow {
        info!("▶️ 会话驱动已启动");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.dispatch(command).await,
                    None => break,
                },
                payload = self.flow.next_scanned_payload(), if self.flow.is_scanning() => {
                    let outcome = self.flow.handle_scanned_payload(payload).await;
                    if let Err(e) = outcome {
                        self.report(e);
                    }
                }
            }
            self.forward_events();
        }

        self.flow.stop_scanner().await;
        self.forward_events();
        info!("⏹️ 会话驱动已停止 (阶段: {})", self.flow.phase());
        self.flow
    }

    async fn dispatch(&mut self, command: Command) {
        let camera = self.camera.as_deref();
        if let Err(e) = self.flow.apply(command, camera).await {
            self.report(e);
        }
    }

    /// 用户可见的错误已经以提示事件发出，这里只记日志；
    /// 其余错误是调用方的使用问题，作为拒绝事件回传
    fn report(&mut self, error: AppError) {
        if error.is_recoverable() {
            warn!("⚠️ {}", error);
            return;
        }
        error!("❌ 指令被拒绝: {}", error);
        self.send(WorkflowEvent::CommandRejected {
            reason: error.to_string(),
        });
    }

    fn forward_events(&mut self) {
        for event in self.flow.drain_events() {
            self.send(event);
        }
    }

    fn send(&self, event: WorkflowEvent) {
        if self.events.send(event).is_err() {
            debug!("事件接收端已关闭，丢弃事件");
        }
    }
}

impl SessionHandle {
    /// 发送一条指令
    pub async fn send(&self, command: Command) -> AppResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AppError::Workflow(WorkflowError::SessionClosed))
    }

    /// 等待下一个事件；会话结束且事件取完后返回 `None`
    pub async fn next_event(&mut self) -> Option<WorkflowEvent> {
        self.events.recv().await
    }

    /// 关闭指令通道，等待驱动处理完已排队的指令
    ///
    /// # 返回
    /// 最终的流程状态，以及尚未被取走的事件
    pub async fn shutdown(self) -> AppResult<(ScanFlow, Vec<WorkflowEvent>)> {
        let Self {
            commands,
            mut events,
            task,
        } = self;
        drop(commands);

        let flow = task.await.map_err(|e| {
            error!("会话任务异常结束: {}", e);
            AppError::Workflow(WorkflowError::SessionClosed)
        })?;

        let mut remaining = Vec::new();
        while let Ok(event) = events.try_recv() {
            remaining.push(event);
        }
        Ok((flow, remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MockGrader;
    use crate::workflow::{Notice, Phase};
    use std::time::Duration;

    fn flow() -> ScanFlow {
        let grader = MockGrader::new(Duration::from_millis(1), 1.0).with_seed(7);
        ScanFlow::new(Arc::new(grader))
    }

    #[tokio::test]
    async fn test_commands_are_processed_in_order() {
        let mut handle = SessionDriver::spawn(flow(), None);
        handle
            .send(Command::SubmitQr(
                r#"{"test_id":"T1","answer_key_id":"K1","question_count":3}"#.to_string(),
            ))
            .await
            .unwrap();

        let first = handle.next_event().await.unwrap();
        assert!(matches!(first, WorkflowEvent::Notice(Notice::QrScanned { .. })));
        let second = handle.next_event().await.unwrap();
        assert_eq!(
            second,
            WorkflowEvent::PhaseChanged {
                from: Phase::AwaitingQr,
                to: Phase::CapturingSheet
            }
        );

        let (flow, remaining) = handle.shutdown().await.unwrap();
        assert!(remaining.is_empty());
        assert_eq!(flow.phase(), Phase::CapturingSheet);
    }

    #[tokio::test]
    async fn test_misuse_is_reported_as_rejection() {
        let handle = SessionDriver::spawn(flow(), None);
        handle.send(Command::RemoveImage(0)).await.unwrap();

        let (flow, remaining) = handle.shutdown().await.unwrap();
        assert_eq!(flow.phase(), Phase::AwaitingQr);
        assert!(matches!(
            remaining.as_slice(),
            [WorkflowEvent::CommandRejected { .. }]
        ));
    }

    #[tokio::test]
    async fn test_start_scanner_without_camera_notifies() {
        let handle = SessionDriver::spawn(flow(), None);
        handle.send(Command::StartScanner).await.unwrap();

        let (flow, remaining) = handle.shutdown().await.unwrap();
        assert!(!flow.is_scanning());
        assert!(matches!(
            remaining.as_slice(),
            [WorkflowEvent::Notice(Notice::CameraUnavailable(_))]
        ));
    }
}
