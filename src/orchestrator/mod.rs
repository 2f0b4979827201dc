//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责把流程层接到外部输入上，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `session_driver` - 会话驱动器
//! - 独占一个 `ScanFlow`
//! - 在同一个循环里串行处理界面指令和扫码结果
//! - 按发生顺序转发流程事件
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、运行）
//! - 从配置和答题卡目录构造指令
//! - 输出成绩并写入日志文件
//!
//! ## 层次关系
//!
//! ```text
//! app (一次完整的扫码判分)
//!     ↓
//! session_driver (指令队列 → ScanFlow)
//!     ↓
//! workflow::ScanFlow (阶段推进)
//!     ↓
//! services (能力层：qr_parser / capture_store / grader / camera)
//!     ↓
//! infrastructure (基础设施：QrScanner / PreviewRegistry)
//! ```

pub mod app;
pub mod session_driver;

pub use app::App;
pub use session_driver::{SessionDriver, SessionHandle};
