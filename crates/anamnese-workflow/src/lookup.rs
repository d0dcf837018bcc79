//! 报告查询
//!
//! 按患者 CPF 在报告集合中查找。当前数据源是内存中的示例数据，带固定的模拟延迟；
//! 接入真实后端时只需替换 [`ReportRepository`] 实现，匹配语义保持一致。

use std::sync::Arc;
use std::time::Duration;

use anamnese_core::utils::{is_searchable, search_prefix};
use anamnese_core::{AnamneseError, Report, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 报告数据源
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// 返回患者 CPF 包含给定数字片段的所有报告
    async fn find_by_cpf_fragment(&self, fragment: &str) -> Result<Vec<Report>>;
}

/// 内存报告数据源
#[derive(Debug, Clone)]
pub struct InMemoryReportRepository {
    reports: Vec<Report>,
    latency: Duration,
}

impl InMemoryReportRepository {
    pub fn new(reports: Vec<Report>) -> Self {
        Self {
            reports,
            latency: Duration::ZERO,
        }
    }

    /// 设置模拟延迟
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

#[async_trait]
impl ReportRepository for InMemoryReportRepository {
    async fn find_by_cpf_fragment(&self, fragment: &str) -> Result<Vec<Report>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        Ok(self
            .reports
            .iter()
            .filter(|report| report.patient.cpf.contains(fragment))
            .cloned()
            .collect())
    }
}

/// 查询参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LookupSettings {
    /// 最少有效数字位数
    pub min_digits: usize,
    /// 用于匹配的前缀位数
    pub prefix_digits: usize,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            min_digits: 11,
            prefix_digits: 3,
        }
    }
}

/// 报告查询服务
#[derive(Clone)]
pub struct ReportLookup {
    repository: Arc<dyn ReportRepository>,
    settings: LookupSettings,
}

impl ReportLookup {
    pub fn new(repository: Arc<dyn ReportRepository>, settings: LookupSettings) -> Self {
        Self {
            repository,
            settings,
        }
    }

    pub fn settings(&self) -> &LookupSettings {
        &self.settings
    }

    pub fn can_search(&self, key: &str) -> bool {
        is_searchable(key, self.settings.min_digits)
    }

    /// 执行查询
    ///
    /// 键不足最少位数时返回 `Validation`，不会访问数据源。
    pub async fn search(&self, key: &str) -> Result<Vec<Report>> {
        if !self.can_search(key) {
            return Err(AnamneseError::Validation(format!(
                "Search key must contain at least {} digits",
                self.settings.min_digits
            )));
        }

        let fragment = search_prefix(key, self.settings.prefix_digits);
        tracing::debug!("Searching reports by CPF fragment {}", fragment);

        let results = self
            .repository
            .find_by_cpf_fragment(&fragment)
            .await
            .map_err(|e| match e {
                AnamneseError::Lookup(_) => e,
                other => AnamneseError::Lookup(other.to_string()),
            })?;

        tracing::info!("Lookup returned {} report(s)", results.len());
        Ok(results)
    }
}

impl std::fmt::Debug for ReportLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportLookup")
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anamnese_core::fixtures::sample_reports;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRepository {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReportRepository for CountingRepository {
        async fn find_by_cpf_fragment(&self, _fragment: &str) -> Result<Vec<Report>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    struct FailingRepository;

    #[async_trait]
    impl ReportRepository for FailingRepository {
        async fn find_by_cpf_fragment(&self, _fragment: &str) -> Result<Vec<Report>> {
            Err(AnamneseError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "backend unavailable",
            )))
        }
    }

    fn fixture_lookup() -> ReportLookup {
        let repository = InMemoryReportRepository::new(sample_reports().unwrap());
        ReportLookup::new(Arc::new(repository), LookupSettings::default())
    }

    #[tokio::test]
    async fn test_search_matches_first_three_digits() {
        let lookup = fixture_lookup();

        let results = lookup.search("123.000.000-00").await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rep-001", "rep-002"]);

        let results = lookup.search("98765432100").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "rep-003");
    }

    #[tokio::test]
    async fn test_search_without_matches_is_empty() {
        let lookup = fixture_lookup();
        let results = lookup.search("555.555.555-55").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_short_key_never_reaches_repository() {
        let repository = Arc::new(CountingRepository {
            calls: AtomicUsize::new(0),
        });
        let lookup = ReportLookup::new(repository.clone(), LookupSettings::default());

        let result = lookup.search("123").await;
        assert!(matches!(result, Err(AnamneseError::Validation(_))));
        assert_eq!(repository.calls.load(Ordering::SeqCst), 0);

        lookup.search("123.456.789-01").await.unwrap();
        assert_eq!(repository.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repository_failure_is_lookup_error() {
        let lookup = ReportLookup::new(Arc::new(FailingRepository), LookupSettings::default());
        let result = lookup.search("123.456.789-01").await;
        assert!(matches!(result, Err(AnamneseError::Lookup(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_latency() {
        let repository = InMemoryReportRepository::new(sample_reports().unwrap())
            .with_latency(Duration::from_millis(500));
        let lookup = ReportLookup::new(Arc::new(repository), LookupSettings::default());

        let started = tokio::time::Instant::now();
        lookup.search("123.456.789-00").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
