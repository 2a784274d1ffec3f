//! Review verdict parsing and aggregation.
//!
//! Reviewer output is free text. A reviewer passes only when its output
//! carries an explicit `verdict: pass` marker; anything ambiguous fails.

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::OnceLock;

use crate::domain::models::{
    Finding, ReviewAggregate, ReviewVerdict, Severity, Verdict,
};

fn verdict_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bverdict\b[\s*_#]*[:=][\s*_]*(pass|fail)\b").expect("valid verdict regex")
    })
}

fn finding_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*[-*]\s*\**(must[_\- ]fix|should[_\- ]fix|suggestion)\**\s*:\s*(.+?)\s*$")
            .expect("valid finding regex")
    })
}

fn location_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^`?(?P<file>[^\s:`]*[./][^\s:`]*)`?(?::(?P<line>\d+))?\s*(?:—|–|--|-|:)\s+(?P<desc>\S.*)$",
        )
        .expect("valid location regex")
    })
}

/// Parse one reviewer's raw output into a verdict with findings.
///
/// Any `verdict: fail` marker wins over `verdict: pass`; no marker at all is
/// a fail.
pub fn parse_verdict(raw_output: &str, reviewer: &str) -> ReviewVerdict {
    let mut saw_pass = false;
    let mut saw_fail = false;
    for caps in verdict_re().captures_iter(raw_output) {
        if caps[1].eq_ignore_ascii_case("pass") {
            saw_pass = true;
        } else {
            saw_fail = true;
        }
    }
    let verdict = if saw_pass && !saw_fail {
        Verdict::Pass
    } else {
        Verdict::Fail
    };

    ReviewVerdict {
        reviewer: reviewer.to_string(),
        verdict,
        findings: parse_findings(raw_output),
        raw_output: raw_output.to_string(),
    }
}

/// Extract `- <severity>: <body>` lines in order of appearance.
pub fn parse_findings(raw_output: &str) -> Vec<Finding> {
    raw_output
        .lines()
        .filter_map(|line| {
            let caps = finding_re().captures(line)?;
            let severity = Severity::from_str(&caps[1])?;
            Some(parse_finding_body(severity, &caps[2]))
        })
        .collect()
}

/// Split an optional `file[:line]: description` prefix off a finding body.
fn parse_finding_body(severity: Severity, body: &str) -> Finding {
    match location_re().captures(body) {
        Some(caps) => Finding {
            file_path: Some(caps["file"].to_string()),
            line: caps.name("line").and_then(|m| m.as_str().parse().ok()),
            severity,
            description: caps["desc"].trim().to_string(),
        },
        None => Finding {
            file_path: None,
            line: None,
            severity,
            description: body.trim().to_string(),
        },
    }
}

/// Roll verdicts up into pass/fail and finding counts.
pub fn aggregate_verdicts(verdicts: &[ReviewVerdict]) -> ReviewAggregate {
    let mut aggregate = ReviewAggregate {
        reviewer_count: verdicts.len(),
        ..Default::default()
    };

    for verdict in verdicts {
        if !verdict.passed() {
            aggregate.failed_reviewers.push(verdict.reviewer.clone());
        }
        for finding in &verdict.findings {
            match finding.severity {
                Severity::MustFix => aggregate.must_fix_count += 1,
                Severity::ShouldFix => aggregate.should_fix_count += 1,
                Severity::Suggestion => aggregate.suggestion_count += 1,
            }
        }
        aggregate.total_findings += verdict.findings.len();
    }

    aggregate.all_passed = aggregate.failed_reviewers.is_empty();
    aggregate
}

/// Markdown block of every finding grouped by file; empty when there are none.
pub fn build_fix_instructions(verdicts: &[ReviewVerdict]) -> String {
    let mut by_file: BTreeMap<&str, Vec<(&str, &Finding)>> = BTreeMap::new();
    let mut general: Vec<(&str, &Finding)> = Vec::new();

    for verdict in verdicts {
        for finding in &verdict.findings {
            let entry = (verdict.reviewer.as_str(), finding);
            match finding.file_path.as_deref() {
                Some(path) => by_file.entry(path).or_default().push(entry),
                None => general.push(entry),
            }
        }
    }

    if by_file.is_empty() && general.is_empty() {
        return String::new();
    }

    let mut out = String::from("## Review fix instructions\n");
    for (path, mut findings) in by_file {
        findings.sort_by_key(|(_, f)| f.severity);
        let _ = write!(out, "\n### {path}\n");
        for (reviewer, finding) in findings {
            write_finding(&mut out, reviewer, finding);
        }
    }
    if !general.is_empty() {
        general.sort_by_key(|(_, f)| f.severity);
        out.push_str("\n### General\n");
        for (reviewer, finding) in general {
            write_finding(&mut out, reviewer, finding);
        }
    }
    out
}

fn write_finding(out: &mut String, reviewer: &str, finding: &Finding) {
    match finding.line {
        Some(line) => {
            let _ = writeln!(
                out,
                "- [{}] line {}: {} ({})",
                finding.severity.as_str(),
                line,
                finding.description,
                reviewer
            );
        }
        None => {
            let _ = writeln!(
                out,
                "- [{}] {} ({})",
                finding.severity.as_str(),
                finding.description,
                reviewer
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_marker_defaults_to_fail() {
        let v = parse_verdict("no marker here", "r1");
        assert_eq!(v.verdict, Verdict::Fail);
        assert_eq!(v.reviewer, "r1");
        assert!(v.findings.is_empty());
    }

    #[test]
    fn test_marker_variants() {
        assert_eq!(parse_verdict("Verdict: PASS", "r").verdict, Verdict::Pass);
        assert_eq!(parse_verdict("**Verdict:** pass\n", "r").verdict, Verdict::Pass);
        assert_eq!(parse_verdict("## VERDICT: Fail", "r").verdict, Verdict::Fail);
        assert_eq!(parse_verdict("verdict = pass", "r").verdict, Verdict::Pass);
    }

    #[test]
    fn test_conflicting_markers_fail() {
        let v = parse_verdict("verdict: pass\n...\nverdict: fail", "r");
        assert_eq!(v.verdict, Verdict::Fail);
    }

    #[test]
    fn test_word_passing_is_not_a_marker() {
        let v = parse_verdict("the verdict is still out, tests passing", "r");
        assert_eq!(v.verdict, Verdict::Fail);
    }

    #[test]
    fn test_findings_with_location() {
        let raw = "Verdict: fail\n\
                   - must_fix: src/auth.rs:42 — token never expires\n\
                   - should_fix: `lib/util.py` - unused import\n\
                   - suggestion: consider a builder here\n\
                   - nitpick: ignored severity\n";
        let v = parse_verdict(raw, "r1");
        assert_eq!(v.findings.len(), 3);

        assert_eq!(v.findings[0].severity, Severity::MustFix);
        assert_eq!(v.findings[0].file_path.as_deref(), Some("src/auth.rs"));
        assert_eq!(v.findings[0].line, Some(42));
        assert_eq!(v.findings[0].description, "token never expires");

        assert_eq!(v.findings[1].file_path.as_deref(), Some("lib/util.py"));
        assert_eq!(v.findings[1].line, None);
        assert_eq!(v.findings[1].description, "unused import");

        assert_eq!(v.findings[2].file_path, None);
        assert_eq!(v.findings[2].description, "consider a builder here");
    }

    #[test]
    fn test_severity_spellings() {
        let findings = parse_findings("* Must-Fix: a.rs: broken\n- SHOULD FIX: meh");
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::MustFix);
        assert_eq!(findings[0].file_path.as_deref(), Some("a.rs"));
        assert_eq!(findings[1].severity, Severity::ShouldFix);
    }

    #[test]
    fn test_aggregate_all_pass() {
        let verdicts = vec![parse_verdict("verdict: pass", "a"), parse_verdict("verdict: pass", "b")];
        let agg = aggregate_verdicts(&verdicts);
        assert!(agg.all_passed);
        assert!(agg.failed_reviewers.is_empty());
        assert_eq!(agg.reviewer_count, 2);
    }

    #[test]
    fn test_aggregate_counts() {
        let verdicts = vec![
            parse_verdict("verdict: fail\n- must_fix: a.rs:1 - x\n- should_fix: y", "a"),
            parse_verdict("verdict: pass\n- suggestion: z", "b"),
        ];
        let agg = aggregate_verdicts(&verdicts);
        assert!(!agg.all_passed);
        assert_eq!(agg.failed_reviewers, vec!["a".to_string()]);
        assert_eq!(agg.must_fix_count, 1);
        assert_eq!(agg.should_fix_count, 1);
        assert_eq!(agg.suggestion_count, 1);
        assert_eq!(agg.total_findings, 3);
    }

    #[test]
    fn test_fix_instructions_empty_without_findings() {
        let verdicts = vec![parse_verdict("verdict: fail", "a")];
        assert_eq!(build_fix_instructions(&verdicts), "");
    }

    #[test]
    fn test_fix_instructions_grouped_by_file() {
        let verdicts = vec![
            parse_verdict("- suggestion: b.rs - rename\n- must_fix: a.rs:3 - crash", "r1"),
            parse_verdict("- should_fix: a.rs - log it\n- should_fix: general cleanup", "r2"),
        ];
        let md = build_fix_instructions(&verdicts);
        let a = md.find("### a.rs").unwrap();
        let b = md.find("### b.rs").unwrap();
        let general = md.find("### General").unwrap();
        assert!(a < b && b < general);
        assert!(md.contains("- [must_fix] line 3: crash (r1)"));
        assert!(md.contains("- [should_fix] log it (r2)"));
        // must_fix sorts ahead of should_fix within a file
        assert!(md.find("crash").unwrap() < md.find("log it").unwrap());
    }
}
