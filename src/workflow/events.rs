//! 流程对外发出的事件
//!
//! 只提供结构化数据和默认文案，如何展示由界面层决定

use crate::error::{DeviceError, ParseError};
use crate::workflow::Phase;

/// 提示级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Destructive,
}

/// 给用户的提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// 扫码成功
    QrScanned {
        test_id: String,
        question_count: u32,
        topic: Option<String>,
    },
    /// 扫到的码不是有效的试卷码
    InvalidQr(ParseError),
    /// 摄像头不可用，改用文件上传
    CameraUnavailable(DeviceError),
    /// 判分完成
    GradingComplete { correct: u32, total: u32 },
    /// 判分失败，可以重新提交
    GradingFailed { reason: String },
}

impl Notice {
    pub fn title(&self) -> &'static str {
        match self {
            Notice::QrScanned { .. } => "QR Code Scanned!",
            Notice::InvalidQr(_) => "Invalid QR Code",
            Notice::CameraUnavailable(_) => "Camera Unavailable",
            Notice::GradingComplete { .. } => "Grading Complete!",
            Notice::GradingFailed { .. } => "Grading Failed",
        }
    }

    pub fn description(&self) -> String {
        match self {
            Notice::QrScanned {
                question_count,
                topic,
                ..
            } => match topic {
                Some(topic) => format!("Test detected: {} questions • {}", question_count, topic),
                None => format!("Test detected: {} questions", question_count),
            },
            Notice::InvalidQr(ParseError::MalformedPayload) => {
                "Invalid QR code. Please scan a valid test QR code.".to_string()
            }
            Notice::InvalidQr(ParseError::MissingRequiredFields { .. }) => {
                "Invalid QR code format. Please scan a valid test QR code.".to_string()
            }
            Notice::CameraUnavailable(DeviceError::NoCamera) => {
                "No cameras found on this device. Please upload an image instead.".to_string()
            }
            Notice::CameraUnavailable(DeviceError::PermissionDenied) => {
                "Unable to access camera. Please grant camera permissions or upload an image instead."
                    .to_string()
            }
            Notice::CameraUnavailable(_) => {
                "Failed to start camera. Please try again or upload an image instead.".to_string()
            }
            Notice::GradingComplete { correct, total } => {
                format!("You scored {}/{}", correct, total)
            }
            Notice::GradingFailed { .. } => {
                "There was an error processing your answer sheet. Please try again.".to_string()
            }
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Notice::QrScanned { .. } | Notice::GradingComplete { .. } => Severity::Info,
            _ => Severity::Destructive,
        }
    }
}

/// 交给导航层的意图
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationIntent {
    /// 查看详细解析
    ShowDetails { test_id: String },
    /// 再扫一份
    ScanAnother,
    /// 关闭扫码页
    ExitScanner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    PhaseChanged { from: Phase, to: Phase },
    Notice(Notice),
    Navigate(NavigationIntent),
    /// 指令被拒绝（调用方的使用错误，不展示给用户）
    CommandRejected { reason: String },
}
