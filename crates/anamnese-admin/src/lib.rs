//! # 问卷审核运维模块
//!
//! 提供分层配置加载、配置验证和日志初始化

pub mod config;
pub mod logging;

pub use self::config::{
    AppConfig, ConfigValidator, ExportConfig, LookupConfig, SignatureConfig, WorkflowConfig,
};
pub use logging::{init_logging, LogFormat, LoggingConfig};
