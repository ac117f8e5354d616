// ✅ Data Quality - Recoverable problems found during an import
//
// Nothing in here halts a run. Issues are logged when raised and counted in
// the final report so the source data can be reviewed later.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

// ============================================================================
// SEVERITY & KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning, // Data was skipped, guessed or is missing
    Info,    // Data was valid but reshaped (e.g. merged)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueKind {
    /// Record without a usable name, skipped
    MalformedRecord,

    /// Facility mention with no loaded Facility record; created name-only
    UnresolvedReference,

    /// Waste item with an empty disposal-target cell
    NoDisposalTarget,

    /// Non-empty target cell where every mention was filtered as a note
    NoValidTarget,

    /// Facility record merged into an earlier one with the same canonical name
    MergedDuplicate,
}

impl IssueKind {
    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::MergedDuplicate => Severity::Info,
            _ => Severity::Warning,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::MalformedRecord => "malformed record",
            IssueKind::UnresolvedReference => "unresolved reference",
            IssueKind::NoDisposalTarget => "no disposal target",
            IssueKind::NoValidTarget => "no valid target",
            IssueKind::MergedDuplicate => "merged duplicate",
        }
    }
}

// ============================================================================
// QUALITY ISSUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: Severity,
    pub kind: IssueKind,

    /// What the issue is about (record position, item or facility name)
    pub subject: String,

    pub detail: String,
}

impl QualityIssue {
    /// Build an issue and log it at its severity
    pub fn raise(kind: IssueKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        let issue = QualityIssue {
            severity: kind.severity(),
            kind,
            subject: subject.into(),
            detail: detail.into(),
        };

        match issue.severity {
            Severity::Warning => warn!(
                kind = issue.kind.as_str(),
                subject = %issue.subject,
                "{}",
                issue.detail
            ),
            Severity::Info => debug!(
                kind = issue.kind.as_str(),
                subject = %issue.subject,
                "{}",
                issue.detail
            ),
        }

        issue
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub warnings: usize,
    pub infos: usize,
    pub by_kind: BTreeMap<IssueKind, usize>,
}

impl QualitySummary {
    pub fn from_issues(issues: &[QualityIssue]) -> Self {
        let mut summary = QualitySummary::default();

        for issue in issues {
            match issue.severity {
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.infos += 1,
            }
            *summary.by_kind.entry(issue.kind).or_insert(0) += 1;
        }

        summary
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn summary(&self) -> String {
        if self.by_kind.is_empty() {
            return "no data-quality issues".to_string();
        }

        let parts: Vec<String> = self
            .by_kind
            .iter()
            .map(|(kind, count)| format!("{} {}", count, kind.as_str()))
            .collect();

        format!(
            "{} warning(s), {} info: {}",
            self.warnings,
            self.infos,
            parts.join(", ")
        )
    }
}
