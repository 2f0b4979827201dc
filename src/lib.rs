//! # Answer Sheet Scan
//!
//! 学生端"扫码 → 拍答题卡 → 判分 → 看成绩"流程的 Rust 实现
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `QrScanner` - 后台扫码任务，独占摄像头租约
//! - `PreviewRegistry` - 预览句柄登记表，保证每个句柄只释放一次
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `qr_parser` - 二维码文本 → 试卷描述
//! - `ImageCaptureStore` - 答题卡图片的有序集合
//! - `Grader` / `MockGrader` - 判分能力
//! - `Camera` - 摄像头设备抽象
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义一次扫码判分的阶段和转换
//! - `WorkflowSession` - 会话数据
//! - `ScanFlow` - 阶段推进（扫码 → 拍摄 → 判分 → 成绩）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session_driver` - 串行处理指令，转发事件
//! - `orchestrator/app` - 应用入口
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{PreviewHandle, QrScanner};
pub use models::{GradingResult, TestDescriptor};
pub use orchestrator::{App, SessionDriver, SessionHandle};
pub use services::{Camera, Grader, ImageCaptureStore, MockGrader};
pub use workflow::{Command, Notice, Phase, ScanFlow, WorkflowEvent, WorkflowSession};
