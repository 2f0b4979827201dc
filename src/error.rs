use thiserror::Error;

use crate::workflow::Phase;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 二维码内容解析错误
    #[error("二维码错误: {0}")]
    Parse(#[from] ParseError),
    /// 答题卡图片管理错误
    #[error("图片错误: {0}")]
    Capture(#[from] CaptureError),
    /// 判分错误
    #[error("判分错误: {0}")]
    Grading(#[from] GradingError),
    /// 摄像头设备错误
    #[error("设备错误: {0}")]
    Device(#[from] DeviceError),
    /// 流程状态错误
    #[error("流程错误: {0}")]
    Workflow(#[from] WorkflowError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
}

/// 二维码内容解析错误
///
/// 两种失败分开，调用方据此区分"不是可识别的码"和"可识别但不是试卷码"
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// 内容无法解码为结构化记录
    #[error("二维码内容不是结构化记录")]
    MalformedPayload,
    /// 记录缺少必填字段或字段无效
    #[error("缺少必填字段: {}", fields.join(", "))]
    MissingRequiredFields { fields: Vec<&'static str> },
}

/// 答题卡图片管理错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// 删除位置越界
    #[error("索引 {index} 超出范围 (共 {len} 张)")]
    IndexOutOfRange { index: usize, len: usize },
    /// 预览句柄已释放或不属于本登记表
    #[error("预览句柄 #{id} 不存在或已释放")]
    HandleNotLive { id: u64 },
}

/// 判分错误（均对应 GradingFailed）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradingError {
    /// 没有任何答题卡图片
    #[error("没有可判分的答题卡图片")]
    NoImages,
    /// 题目数量无效
    #[error("题目数量无效: {0}")]
    InvalidQuestionCount(u32),
    /// 判分后端调用失败
    #[error("判分服务失败: {0}")]
    Backend(String),
    /// 判分结果与试卷不一致
    #[error("判分结果不一致: {0}")]
    InconsistentResult(String),
}

/// 摄像头设备错误（均为非致命）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// 设备上没有摄像头
    #[error("未找到摄像头")]
    NoCamera,
    /// 用户拒绝了摄像头权限
    #[error("摄像头权限被拒绝")]
    PermissionDenied,
    /// 打开或读取视频流失败
    #[error("视频流错误: {0}")]
    StreamFailed(String),
    /// 扫描流已结束
    #[error("扫描已停止")]
    StreamEnded,
}

/// 流程状态错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// 当前阶段不允许该操作
    #[error("阶段 {phase} 不允许操作: {action}")]
    InvalidTransition { phase: Phase, action: &'static str },
    /// 会话中缺少试卷描述
    #[error("会话中没有试卷信息")]
    MissingDescriptor,
    /// 会话驱动已经结束
    #[error("会话已关闭")]
    SessionClosed,
}

/// 配置错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置值超出允许范围
    #[error("配置项 {field} 无效: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建非法状态转换错误
    pub fn invalid_transition(phase: Phase, action: &'static str) -> Self {
        AppError::Workflow(WorkflowError::InvalidTransition { phase, action })
    }

    /// 是否为用户可见、可在本地恢复的错误
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Parse(_) | AppError::Grading(_) | AppError::Device(_)
        )
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
