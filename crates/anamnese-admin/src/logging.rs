//! 日志初始化
//!
//! 基于 tracing-subscriber 的全局订阅器，`RUST_LOG` 优先于配置中的级别。

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// 输出格式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 级别名称或 EnvFilter 指令，如 `info,anamnese_workflow=debug`
    pub level: String,
    pub format: LogFormat,
    /// 是否输出终端颜色
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// 检查级别能否解析为 EnvFilter 指令
    pub fn validate(&self) -> Result<()> {
        self.configured_filter().map(|_| ())
    }

    fn configured_filter(&self) -> Result<EnvFilter> {
        if self.level.trim().is_empty() {
            bail!("logging.level must not be empty");
        }
        EnvFilter::try_new(self.level.trim())
            .with_context(|| format!("Invalid log filter: {}", self.level))
    }

    fn filter(&self) -> Result<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => self.configured_filter(),
        }
    }
}

/// 安装全局日志订阅器，只能成功调用一次
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = config.filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(false);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;

    tracing::debug!("Logging initialised ({:?}, level {})", config.format, config.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_level_and_directives() {
        let mut config = LoggingConfig::default();
        config.validate().unwrap();

        config.level = "DEBUG".to_string();
        config.validate().unwrap();

        config.level = "info,anamnese_export=trace".to_string();
        config.validate().unwrap();

        config.level = "anamnese_export=verbose".to_string();
        assert!(config.validate().is_err());

        config.level = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_format_serialization() {
        let config: LoggingConfig =
            toml::from_str("level = \"warn\"\nformat = \"pretty\"\nansi = false\n").unwrap();
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.ansi);

        let partial: LoggingConfig = toml::from_str("level = \"trace\"\n").unwrap();
        assert_eq!(partial.format, LogFormat::Compact);
        assert!(partial.ansi);
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig {
            ansi: false,
            ..LoggingConfig::default()
        };
        // 测试进程中可能已有其他测试安装过订阅器
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
