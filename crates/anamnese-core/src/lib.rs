//! # Anamnese Core
//!
//! 问卷审核系统的核心模块，提供领域数据结构、错误定义、通用工具和内置示例数据。

pub mod error;
pub mod fixtures;
pub mod models;
pub mod utils;

pub use error::{AnamneseError, Result};
pub use models::*;
