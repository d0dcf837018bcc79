//! 配置管理
//!
//! 默认值 → TOML 配置文件 → `ANAMNESE_` 前缀环境变量，逐层覆盖。

use std::time::Duration;

use anamnese_export::{PadSettings, PageLayout};
use anamnese_workflow::{BackNavigation, LookupSettings};
use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::logging::LoggingConfig;

/// 系统完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 报告查询配置
    pub lookup: LookupConfig,
    /// 工作流配置
    pub workflow: WorkflowConfig,
    /// 文档导出配置
    pub export: ExportConfig,
    /// 签名面板配置
    pub signature: SignatureConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 报告查询配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// 最少有效数字位数
    pub min_digits: usize,
    /// 匹配使用的前缀位数
    pub prefix_digits: usize,
    /// 模拟查询延迟（毫秒）
    pub latency_ms: u64,
    /// 报告数据文件，未设置时使用内置示例数据
    pub fixtures_path: Option<String>,
}

/// 工作流配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// 返回前面步骤时把后续步骤重置为待处理
    pub revert_downstream_on_back: bool,
}

/// 文档导出配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: String,
    pub file_prefix: String,
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub page_break_y_mm: f32,
}

/// 签名面板配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    pub width_px: u32,
    pub height_px: u32,
    pub stroke_width_px: f32,
    pub stroke_color: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            min_digits: 11,
            prefix_digits: 3,
            latency_ms: 500,
            fixtures_path: None,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: "./output".to_string(),
            file_prefix: "anamnese".to_string(),
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            page_break_y_mm: 250.0,
        }
    }
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            width_px: 400,
            height_px: 150,
            stroke_width_px: 2.0,
            stroke_color: "#1a1a2e".to_string(),
        }
    }
}

impl LookupConfig {
    pub fn settings(&self) -> LookupSettings {
        LookupSettings {
            min_digits: self.min_digits,
            prefix_digits: self.prefix_digits,
        }
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

impl WorkflowConfig {
    pub fn back_navigation(&self) -> BackNavigation {
        if self.revert_downstream_on_back {
            BackNavigation::RevertDownstream
        } else {
            BackNavigation::KeepComplete
        }
    }
}

impl ExportConfig {
    pub fn layout(&self) -> PageLayout {
        PageLayout {
            width_mm: self.page_width_mm,
            height_mm: self.page_height_mm,
            page_break_mm: self.page_break_y_mm,
            ..PageLayout::default()
        }
    }
}

impl SignatureConfig {
    pub fn pad_settings(&self) -> PadSettings {
        PadSettings {
            width_px: self.width_px,
            height_px: self.height_px,
            stroke_width_px: self.stroke_width_px,
            stroke_color: self.stroke_color.clone(),
        }
    }
}

impl AppConfig {
    /// 加载配置，`path` 为空时只使用默认值和环境变量
    pub fn load(path: Option<&str>) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(path: Option<&str>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&AppConfig::default()).context("Failed to build default configuration")?,
        );

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let settings = builder
            .add_source(env)
            .build()
            .context("Failed to load configuration")?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        ConfigValidator::new().validate(&config)?;

        match path {
            Some(path) => info!("Configuration loaded successfully from: {}", path),
            None => debug!("Using default configuration"),
        }
        Ok(config)
    }

    /// 序列化为 TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

}

/// `ANAMNESE_<SECTION>__<KEY>` 形式的环境变量
fn environment() -> Environment {
    Environment::with_prefix("ANAMNESE")
        .prefix_separator("_")
        .separator("__")
}

/// 配置验证器
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, config: &AppConfig) -> Result<()> {
        let lookup = &config.lookup;
        if lookup.min_digits == 0 {
            bail!("lookup.min_digits must be greater than zero");
        }
        if lookup.prefix_digits == 0 || lookup.prefix_digits > lookup.min_digits {
            bail!(
                "lookup.prefix_digits must be between 1 and min_digits ({})",
                lookup.min_digits
            );
        }

        let export = &config.export;
        if export.file_prefix.trim().is_empty() {
            bail!("export.file_prefix must not be empty");
        }
        if export.page_width_mm <= 0.0 || export.page_height_mm <= 0.0 {
            bail!("export page size must be positive");
        }
        if export.page_break_y_mm <= 0.0 || export.page_break_y_mm >= export.page_height_mm {
            bail!("export.page_break_y_mm must lie inside the page");
        }

        let signature = &config.signature;
        if signature.width_px == 0 || signature.height_px == 0 {
            bail!("signature pad size must be non-zero");
        }
        anamnese_export::signature::parse_hex_color(&signature.stroke_color)
            .context("signature.stroke_color is invalid")?;

        config.logging.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        ConfigValidator::new().validate(&config).unwrap();
        assert_eq!(config.lookup.settings(), LookupSettings::default());
        assert_eq!(config.lookup.latency(), Duration::from_millis(500));
        assert_eq!(config.workflow.back_navigation(), BackNavigation::KeepComplete);
        assert_eq!(config.export.layout(), PageLayout::default());
        assert_eq!(config.signature.pad_settings(), PadSettings::default());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("anamnese-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("anamnese.toml");
        std::fs::write(
            &path,
            "[lookup]\nlatency_ms = 0\n\n[workflow]\nrevert_downstream_on_back = true\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.lookup.latency_ms, 0);
        assert_eq!(config.lookup.min_digits, 11);
        assert_eq!(config.workflow.back_navigation(), BackNavigation::RevertDownstream);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_fails() {
        assert!(AppConfig::load(Some("/nonexistent/anamnese.toml")).is_err());
    }

    #[test]
    fn test_validator_rejects_bad_values() {
        let validator = ConfigValidator::new();

        let mut config = AppConfig::default();
        config.lookup.prefix_digits = 12;
        assert!(validator.validate(&config).is_err());

        let mut config = AppConfig::default();
        config.signature.stroke_color = "blue".to_string();
        assert!(validator.validate(&config).is_err());

        let mut config = AppConfig::default();
        config.export.page_break_y_mm = 400.0;
        assert!(validator.validate(&config).is_err());

        let mut config = AppConfig::default();
        config.logging.level = "anamnese_workflow=verbose".to_string();
        assert!(validator.validate(&config).is_err());

        let mut config = AppConfig::default();
        config.logging.level = "warn,anamnese_workflow=debug".to_string();
        validator.validate(&config).unwrap();
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let vars: config::Map<String, String> = [
            ("ANAMNESE_LOOKUP__LATENCY_MS", "7"),
            ("ANAMNESE_EXPORT__FILE_PREFIX", "laudo"),
            ("ANAMNESE_WORKFLOW__REVERT_DOWNSTREAM_ON_BACK", "true"),
            ("OTHER_LOOKUP__LATENCY_MS", "9"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = AppConfig::load_with_env(None, environment().source(Some(vars))).unwrap();
        assert_eq!(config.lookup.latency_ms, 7);
        assert_eq!(config.export.file_prefix, "laudo");
        assert!(config.workflow.revert_downstream_on_back);
        assert_eq!(config.lookup.min_digits, 11);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::default();
        let parsed: AppConfig = toml::from_str(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
