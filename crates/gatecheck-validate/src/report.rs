//! Validation reports.
//!
//! Each finished RBAC case produces one [`ValidationReport`]. Reports are
//! kept in a [`ReportLog`] so a run can be summarised and queried after the
//! fact.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatecheck_policy::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{ErrorKind, Mismatch, RuleSpec, ValidationResult};

/// Unique identifier for a report entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub Uuid);

impl ReportId {
    /// UUID v7, so ids sort by creation time
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ReportId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    OverPermission,
    UnderPermission,
    /// The case could not produce an RBAC result
    Error,
}

impl Verdict {
    pub fn is_failure(&self) -> bool {
        !matches!(self, Verdict::Pass)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Pass => "pass",
            Verdict::OverPermission => "over_permission",
            Verdict::UnderPermission => "under_permission",
            Verdict::Error => "error",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(Verdict::Pass),
            "over_permission" => Ok(Verdict::OverPermission),
            "under_permission" => Ok(Verdict::UnderPermission),
            "error" => Ok(Verdict::Error),
            _ => Err(format!("Unknown verdict: {}", s)),
        }
    }
}

impl From<Option<Mismatch>> for Verdict {
    fn from(mismatch: Option<Mismatch>) -> Self {
        match mismatch {
            None => Verdict::Pass,
            Some(Mismatch::OverPermission) => Verdict::OverPermission,
            Some(Mismatch::UnderPermission) => Verdict::UnderPermission,
        }
    }
}

/// The recorded outcome of one RBAC case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub id: ReportId,
    pub timestamp: DateTime<Utc>,
    pub idempotent_id: Option<Uuid>,
    pub component: String,
    pub service: String,
    pub rule: String,
    pub role: Role,
    /// None when the expectation could not be resolved
    pub expected_allowed: Option<bool>,
    /// None when the call failed for a non-authorization reason
    pub actual_allowed: Option<bool>,
    pub error_kind: Option<ErrorKind>,
    pub verdict: Verdict,
    pub detail: Option<String>,
}

impl ValidationReport {
    fn base(spec: &RuleSpec, role: &Role, verdict: Verdict) -> Self {
        Self {
            id: ReportId::new(),
            timestamp: Utc::now(),
            idempotent_id: spec.idempotent_id,
            component: spec.component.clone(),
            service: spec.service.clone(),
            rule: spec.rule.clone(),
            role: role.clone(),
            expected_allowed: None,
            actual_allowed: None,
            error_kind: None,
            verdict,
            detail: None,
        }
    }

    pub fn from_result(spec: &RuleSpec, result: &ValidationResult) -> Self {
        let mut report = Self::base(spec, &result.role, result.mismatch.into());
        report.expected_allowed = Some(result.expected.allowed);
        report.actual_allowed = Some(result.actual.allowed);
        report.error_kind = result.actual.error_kind;
        report
    }

    /// A case that ended without an RBAC result.
    pub fn error(spec: &RuleSpec, role: &Role, detail: impl Into<String>) -> Self {
        let mut report = Self::base(spec, role, Verdict::Error);
        report.detail = Some(detail.into());
        report
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

/// Filter for querying reports
#[derive(Clone, Debug, Default)]
pub struct ReportFilter {
    pub rule: Option<String>,
    pub role: Option<Role>,
    pub verdict: Option<Verdict>,
    /// Only non-passing reports
    pub failures_only: bool,
    pub limit: Option<usize>,
}

impl ReportFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = Some(verdict);
        self
    }

    pub fn failures_only(mut self) -> Self {
        self.failures_only = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, report: &ValidationReport) -> bool {
        self.rule.as_ref().map_or(true, |r| *r == report.rule)
            && self.role.as_ref().map_or(true, |r| *r == report.role)
            && self.verdict.map_or(true, |v| v == report.verdict)
            && (!self.failures_only || report.verdict.is_failure())
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report not found: {0}")]
    NotFound(ReportId),
}

/// Storage for validation reports.
#[async_trait]
pub trait ReportLog: Send + Sync {
    async fn record(&self, report: ValidationReport) -> Result<(), ReportError>;

    /// Reports matching the filter, in recording order.
    async fn query(&self, filter: ReportFilter) -> Result<Vec<ValidationReport>, ReportError>;

    async fn get(&self, id: ReportId) -> Result<ValidationReport, ReportError>;

    async fn count(&self, filter: ReportFilter) -> Result<u64, ReportError>;
}

/// In-memory report log for a single run.
#[derive(Debug, Default)]
pub struct MemoryReportLog {
    reports: RwLock<Vec<ValidationReport>>,
}

impl MemoryReportLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn summary(&self) -> ReportSummary {
        ReportSummary::from_reports(self.reports.read().await.iter())
    }
}

#[async_trait]
impl ReportLog for MemoryReportLog {
    async fn record(&self, report: ValidationReport) -> Result<(), ReportError> {
        self.reports.write().await.push(report);
        Ok(())
    }

    async fn query(&self, filter: ReportFilter) -> Result<Vec<ValidationReport>, ReportError> {
        let reports = self.reports.read().await;
        let matching = reports.iter().filter(|r| filter.matches(r)).cloned();
        Ok(match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn get(&self, id: ReportId) -> Result<ValidationReport, ReportError> {
        self.reports
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(ReportError::NotFound(id))
    }

    async fn count(&self, filter: ReportFilter) -> Result<u64, ReportError> {
        let reports = self.reports.read().await;
        Ok(reports.iter().filter(|r| filter.matches(r)).count() as u64)
    }
}

/// Verdict counts over a set of reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub over_permission: usize,
    pub under_permission: usize,
    pub errors: usize,
}

impl ReportSummary {
    pub fn from_reports<'a, I: IntoIterator<Item = &'a ValidationReport>>(reports: I) -> Self {
        let mut summary = Self::default();
        for report in reports {
            summary.total += 1;
            match report.verdict {
                Verdict::Pass => summary.passed += 1,
                Verdict::OverPermission => summary.over_permission += 1,
                Verdict::UnderPermission => summary.under_permission += 1,
                Verdict::Error => summary.errors += 1,
            }
        }
        summary
    }

    pub fn is_clean(&self) -> bool {
        self.passed == self.total
    }
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} case(s): {} passed, {} over-permission, {} under-permission, {} error(s)",
            self.total, self.passed, self.over_permission, self.under_permission, self.errors
        )
    }
}
