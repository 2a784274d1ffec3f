//! Reviewer verdicts and findings produced during a verify cycle.

use serde::{Deserialize, Serialize};

/// Pass/fail outcome of one reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }
}

/// Severity of a review finding, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    MustFix,
    ShouldFix,
    Suggestion,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MustFix => "must_fix",
            Self::ShouldFix => "should_fix",
            Self::Suggestion => "suggestion",
        }
    }

    /// Accepts `must_fix`, `must-fix` and `must fix` spellings.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "must_fix" => Some(Self::MustFix),
            "should_fix" => Some(Self::ShouldFix),
            "suggestion" => Some(Self::Suggestion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// `None` when the finding did not name a file.
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub reviewer: String,
    pub verdict: Verdict,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub raw_output: String,
}

impl ReviewVerdict {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

/// Pass/fail roll-up across all reviewers of one verify cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewAggregate {
    pub all_passed: bool,
    pub reviewer_count: usize,
    pub must_fix_count: usize,
    pub should_fix_count: usize,
    pub suggestion_count: usize,
    pub total_findings: usize,
    pub failed_reviewers: Vec<String>,
}

impl ReviewAggregate {
    pub fn has_failures(&self) -> bool {
        !self.failed_reviewers.is_empty()
    }
}
