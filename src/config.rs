use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError, FileError};

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 模拟判分耗时（毫秒）
    pub grading_latency_ms: u64,
    /// 模拟判分中每题判为正确的概率
    pub correct_probability: f64,
    /// 扫码每秒尝试解码次数
    pub scanner_fps: u32,
    /// 优先选择的摄像头标签关键字（后置摄像头）
    pub preferred_camera_keywords: Vec<String>,
    /// 答题卡图片所在目录
    pub sheet_folder: String,
    /// 二维码文本（命令行运行时代替真实扫码）
    pub qr_payload: Option<String>,
    /// 随机数种子，设置后模拟判分结果可复现
    pub rng_seed: Option<u64>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grading_latency_ms: 2000,
            correct_probability: 0.75,
            scanner_fps: 10,
            preferred_camera_keywords: vec!["back".to_string(), "rear".to_string()],
            sheet_folder: "answer_sheets".to_string(),
            qr_payload: None,
            rng_seed: None,
            verbose_logging: false,
            output_log_file: "scan_log.txt".to_string(),
        }
    }
}

impl Config {
    /// 按顺序加载：`SCAN_CONFIG_FILE` 指向的 TOML 文件（可选）→ 环境变量覆盖 → 校验
    pub fn load() -> AppResult<Self> {
        let base = match std::env::var("SCAN_CONFIG_FILE") {
            Ok(path) => Self::from_toml_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 只从环境变量读取（未设置的项使用默认值）
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件读取，缺失的字段使用默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        Self::from_toml_str(&content).map_err(|source| {
            AppError::File(FileError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            })
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn with_env_overrides(mut self) -> AppResult<Self> {
        if let Some(v) = env_parsed::<u64>("SCAN_GRADING_LATENCY_MS", "u64")? {
            self.grading_latency_ms = v;
        }
        if let Some(v) = env_parsed::<f64>("SCAN_CORRECT_PROBABILITY", "f64")? {
            self.correct_probability = v;
        }
        if let Some(v) = env_parsed::<u32>("SCAN_SCANNER_FPS", "u32")? {
            self.scanner_fps = v;
        }
        if let Ok(v) = std::env::var("SCAN_CAMERA_KEYWORDS") {
            self.preferred_camera_keywords = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = std::env::var("SCAN_SHEET_FOLDER") {
            self.sheet_folder = v;
        }
        if let Ok(v) = std::env::var("SCAN_QR_PAYLOAD") {
            self.qr_payload = Some(v);
        }
        if let Some(v) = env_parsed::<u64>("SCAN_RNG_SEED", "u64")? {
            self.rng_seed = Some(v);
        }
        if let Some(v) = env_parsed::<bool>("VERBOSE_LOGGING", "bool")? {
            self.verbose_logging = v;
        }
        if let Ok(v) = std::env::var("OUTPUT_LOG_FILE") {
            self.output_log_file = v;
        }
        Ok(self)
    }

    /// 检查配置值是否在允许范围内
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.correct_probability) {
            return Err(ConfigError::InvalidValue {
                field: "correct_probability",
                reason: format!("{} 不在 [0, 1] 区间内", self.correct_probability),
            });
        }
        if self.scanner_fps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanner_fps",
                reason: "必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn grading_latency(&self) -> Duration {
        Duration::from_millis(self.grading_latency_ms)
    }

    /// 两次解码尝试之间的间隔
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(1) / self.scanner_fps.max(1)
    }
}

fn env_parsed<T: std::str::FromStr>(
    var_name: &str,
    expected_type: &str,
) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_scan_screen() {
        let config = Config::default();
        assert_eq!(config.grading_latency(), Duration::from_secs(2));
        assert_eq!(config.scanner_fps, 10);
        assert_eq!(config.scan_interval(), Duration::from_millis(100));
        assert!((config.correct_probability - 0.75).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_partial_override() {
        let config = Config::from_toml_str(
            r#"
            grading_latency_ms = 10
            rng_seed = 42
            preferred_camera_keywords = ["environment"]
            "#,
        )
        .unwrap();

        assert_eq!(config.grading_latency_ms, 10);
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.preferred_camera_keywords, vec!["environment"]);
        // 未出现的字段保持默认值
        assert_eq!(config.scanner_fps, 10);
        assert_eq!(config.sheet_folder, "answer_sheets");
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = Config {
            correct_probability: 1.5,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "correct_probability",
                ..
            })
        ));

        let config = Config {
            scanner_fps: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scan_interval_never_zero_for_high_fps() {
        let config = Config {
            scanner_fps: 2000,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.scan_interval(), Duration::from_micros(500));

        let config = Config {
            scanner_fps: u32::MAX,
            ..Config::default()
        };
        assert!(config.scan_interval() > Duration::ZERO);
    }
}
