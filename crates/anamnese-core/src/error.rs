//! 错误定义模块

use thiserror::Error;

/// 问卷审核系统统一错误类型
#[derive(Error, Debug)]
pub enum AnamneseError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效步骤跳转: 从 {from} 到 {to}")]
    InvalidStepTransition { from: u8, to: i64 },

    #[error("尚未选择报告")]
    NoReportSelected,

    #[error("报告查询失败: {0}")]
    Lookup(String),

    #[error("签名处理错误: {0}")]
    Signature(String),

    #[error("文档导出错误: {0}")]
    Export(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 问卷审核系统统一结果类型
pub type Result<T> = std::result::Result<T, AnamneseError>;
