//! 内置示例报告
//!
//! 系统没有真实后端，查询基于这里提供的静态数据集。

use std::path::Path;

use crate::error::Result;
use crate::models::Report;

const SAMPLE_REPORTS_JSON: &str = include_str!("../fixtures/reports.json");

/// 加载内置示例报告
pub fn sample_reports() -> Result<Vec<Report>> {
    parse_reports(SAMPLE_REPORTS_JSON)
}

/// 从 JSON 文件加载报告集合
pub fn load_reports_from_file(path: impl AsRef<Path>) -> Result<Vec<Report>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)?;
    let reports = parse_reports(&raw)?;
    tracing::info!("Loaded {} reports from {}", reports.len(), path.display());
    Ok(reports)
}

fn parse_reports(raw: &str) -> Result<Vec<Report>> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExamType, SuggestionKind};

    #[test]
    fn test_sample_reports_parse() {
        let reports = sample_reports().unwrap();
        assert_eq!(reports.len(), 4);
        assert_eq!(reports[0].exam_type, ExamType::Mri);
        assert_eq!(reports[0].ai_suggestions.len(), 3);
        assert_eq!(reports[0].ai_suggestions[1].kind, SuggestionKind::AdditionalQuestion);
        assert!(reports[1].responsible.is_some());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_reports_from_file("/nonexistent/reports.json").unwrap_err();
        assert!(matches!(err, crate::AnamneseError::Io(_)));
    }
}
