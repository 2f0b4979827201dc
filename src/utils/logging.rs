//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::{AppError, AppResult};
use crate::models::{GradingResult, TestDescriptor};

/// 初始化日志
///
/// 设置了 `RUST_LOG` 时以它为准，否则默认 info，详细模式为 debug；重复调用无副作用
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> AppResult<()> {
    let log_header = format!(
        "{}\n扫码判分日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .map_err(|e| AppError::file_write_failed(log_file_path, e))?;
    Ok(())
}

/// 在日志文件末尾追加一条成绩记录
pub fn append_session_record(
    log_file_path: &str,
    descriptor: &TestDescriptor,
    result: &GradingResult,
) -> AppResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(|e| AppError::file_write_failed(log_file_path, e))?;

    let record = format!(
        "{} | 试卷 {} | 答案 {} | 成绩 {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        descriptor.test_id(),
        descriptor.answer_key_id(),
        result.summary()
    );
    file.write_all(record.as_bytes())
        .map_err(|e| AppError::file_write_failed(log_file_path, e))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(latency_ms: u64, fps: u32) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 答题卡扫码判分");
    info!("⏱️ 模拟判分耗时: {} ms | 扫码频率: {}/s", latency_ms, fps);
    info!("{}", "=".repeat(60));
}

/// 打印最终成绩
///
/// # 参数
/// - `descriptor`: 试卷描述
/// - `result`: 判分结果
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(descriptor: &TestDescriptor, result: &GradingResult, log_file_path: &str) {
    let summary = result.summary();
    info!("\n{}", "=".repeat(60));
    info!("📊 判分完成 - 试卷 {}", descriptor.test_id());
    if let Some(topic) = descriptor.topic() {
        info!("📚 主题: {}", topic);
    }
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 正确: {}/{} ({}%)", summary.correct, summary.total, summary.percentage);
    info!("❌ 错误: {}", summary.incorrect);
    for entry in &summary.review_preview {
        info!(
            "   Q{}: 你的答案 {} | 正确答案 {}",
            entry.question_number, entry.your_answer, entry.correct_answer
        );
    }
    if summary.remaining_review > 0 {
        info!("   另有 {} 道错题待复习", summary.remaining_review);
    }
    info!("💡 {}", summary.message());
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
