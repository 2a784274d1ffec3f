//! SQLite implementation of the LearningRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CandidateStatus, Decision, DetectionType, PatternCandidate, Proposal, ProposalStatus,
    ProposalType, RuleBaseline,
};
use crate::domain::ports::{DecisionCounts, LearningRepository};

use super::{format_datetime, parse_datetime, parse_optional_datetime, parse_uuid};

const CANDIDATE_COLUMNS: &str = "id, detection_type, description, description_hash, count, files, \
     instances, confidence_raw, confidence_final, status, created_at";

const PROPOSAL_COLUMNS: &str = "id, candidate_id, proposal_type, title, description, \
     proposed_content, proposed_path, confidence, status, decision, edited_content, created_at, decided_at";

const BASELINE_COLUMNS: &str =
    "id, proposal_id, rule_path, category, baseline_count, baseline_window_days, created_at";

/// SQL list of the decisions that start a cooldown, e.g. `'reject', 'ignore'`.
fn cooldown_decisions_sql() -> String {
    Decision::ALL
        .iter()
        .filter(|d| d.starts_cooldown())
        .map(|d| format!("'{}'", d.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Clone)]
pub struct SqliteLearningRepository {
    pool: SqlitePool,
}

impl SqliteLearningRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LearningRepository for SqliteLearningRepository {
    async fn save_candidate(&self, candidate: &PatternCandidate) -> DomainResult<()> {
        let files_json = serde_json::to_string(&candidate.files)?;
        let instances_json = serde_json::to_string(&candidate.instances)?;

        sqlx::query(
            r#"INSERT INTO pattern_candidates (id, detection_type, description, description_hash, count,
               files, instances, confidence_raw, confidence_final, status, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(candidate.id.to_string())
        .bind(candidate.detection_type.as_str())
        .bind(&candidate.description)
        .bind(&candidate.description_hash)
        .bind(i64::from(candidate.count))
        .bind(&files_json)
        .bind(&instances_json)
        .bind(candidate.confidence_raw)
        .bind(candidate.confidence_final)
        .bind(candidate.status.as_str())
        .bind(format_datetime(candidate.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_candidate(&self, id: Uuid) -> DomainResult<Option<PatternCandidate>> {
        let row: Option<CandidateRow> = sqlx::query_as(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM pattern_candidates WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn list_candidates(
        &self,
        status: Option<CandidateStatus>,
    ) -> DomainResult<Vec<PatternCandidate>> {
        let rows: Vec<CandidateRow> = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "SELECT {CANDIDATE_COLUMNS} FROM pattern_candidates WHERE status = ? ORDER BY created_at ASC"
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {CANDIDATE_COLUMNS} FROM pattern_candidates ORDER BY created_at ASC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn update_candidate_status(&self, id: Uuid, status: CandidateStatus) -> DomainResult<()> {
        let current = self
            .get_candidate(id)
            .await?
            .ok_or(DomainError::CandidateNotFound(id))?;
        if !current.status.can_transition_to(status) {
            return Err(DomainError::ValidationFailed(format!(
                "candidate {} cannot move from {} to {}",
                id,
                current.status.as_str(),
                status.as_str()
            )));
        }

        sqlx::query("UPDATE pattern_candidates SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn recent_rejections(
        &self,
        since: DateTime<Utc>,
    ) -> DomainResult<HashMap<String, DateTime<Utc>>> {
        let sql = format!(
            r#"SELECT c.description_hash, MAX(p.decided_at)
               FROM proposals p
               JOIN pattern_candidates c ON c.id = p.candidate_id
               WHERE p.decision IN ({}) AND p.decided_at >= ?
               GROUP BY c.description_hash"#,
            cooldown_decisions_sql()
        );
        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
        .bind(format_datetime(since))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(hash, decided_at)| -> DomainResult<(String, DateTime<Utc>)> {
                Ok((hash, parse_datetime(&decided_at)?))
            })
            .collect()
    }

    async fn decision_counts(&self, detection_type: DetectionType) -> DomainResult<DecisionCounts> {
        let sql = format!(
            r#"SELECT
                 SUM(CASE WHEN p.decision = '{}' THEN 1 ELSE 0 END),
                 SUM(CASE WHEN p.decision IN ({}) THEN 1 ELSE 0 END)
               FROM proposals p
               JOIN pattern_candidates c ON c.id = p.candidate_id
               WHERE c.detection_type = ?"#,
            Decision::Accept.as_str(),
            cooldown_decisions_sql()
        );
        let (accepted, rejected): (Option<i64>, Option<i64>) = sqlx::query_as(&sql)
        .bind(detection_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(DecisionCounts {
            accepted: u32::try_from(accepted.unwrap_or(0)).unwrap_or(u32::MAX),
            rejected: u32::try_from(rejected.unwrap_or(0)).unwrap_or(u32::MAX),
        })
    }

    async fn save_proposal(&self, proposal: &Proposal) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO proposals (id, candidate_id, proposal_type, title, description,
               proposed_content, proposed_path, confidence, status, decision, edited_content,
               created_at, decided_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(proposal.id.to_string())
        .bind(proposal.candidate_id.to_string())
        .bind(proposal.proposal_type.as_str())
        .bind(&proposal.title)
        .bind(&proposal.description)
        .bind(&proposal.proposed_content)
        .bind(&proposal.proposed_path)
        .bind(proposal.confidence)
        .bind(proposal.status.as_str())
        .bind(proposal.decision.map(|d| d.as_str()))
        .bind(&proposal.edited_content)
        .bind(format_datetime(proposal.created_at))
        .bind(proposal.decided_at.map(format_datetime))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_proposal(&self, id: Uuid) -> DomainResult<Option<Proposal>> {
        let row: Option<ProposalRow> = sqlx::query_as(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn list_proposals(&self, status: Option<ProposalStatus>) -> DomainResult<Vec<Proposal>> {
        let rows: Vec<ProposalRow> = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE status = ? ORDER BY created_at ASC"
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {PROPOSAL_COLUMNS} FROM proposals ORDER BY created_at ASC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn record_decision(&self, proposal: &Proposal) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE proposals SET status = ?, decision = ?, edited_content = ?, decided_at = ?
               WHERE id = ? AND status IN (?, ?)"#,
        )
        .bind(proposal.status.as_str())
        .bind(proposal.decision.map(|d| d.as_str()))
        .bind(&proposal.edited_content)
        .bind(proposal.decided_at.map(format_datetime))
        .bind(proposal.id.to_string())
        .bind(ProposalStatus::Pending.as_str())
        .bind(ProposalStatus::Presented.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_proposal(proposal.id).await? {
                Some(current) => Err(DomainError::AlreadyDecided {
                    id: proposal.id,
                    status: current.status.as_str().to_string(),
                }),
                None => Err(DomainError::ProposalNotFound(proposal.id)),
            };
        }

        Ok(())
    }

    async fn save_baseline(&self, baseline: &RuleBaseline) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO rule_baselines (id, proposal_id, rule_path, category, baseline_count,
               baseline_window_days, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(baseline.id.to_string())
        .bind(baseline.proposal_id.to_string())
        .bind(&baseline.rule_path)
        .bind(&baseline.category)
        .bind(i64::try_from(baseline.baseline_count).unwrap_or(i64::MAX))
        .bind(i64::from(baseline.baseline_window_days))
        .bind(format_datetime(baseline.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn baseline_for_proposal(&self, proposal_id: Uuid) -> DomainResult<Option<RuleBaseline>> {
        let row: Option<BaselineRow> = sqlx::query_as(&format!(
            "SELECT {BASELINE_COLUMNS} FROM rule_baselines WHERE proposal_id = ?"
        ))
        .bind(proposal_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn list_baselines(&self) -> DomainResult<Vec<RuleBaseline>> {
        let rows: Vec<BaselineRow> = sqlx::query_as(&format!(
            "SELECT {BASELINE_COLUMNS} FROM rule_baselines ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    id: String,
    detection_type: String,
    description: String,
    description_hash: String,
    count: i64,
    files: String,
    instances: String,
    confidence_raw: f64,
    confidence_final: f64,
    status: String,
    created_at: String,
}

impl TryFrom<CandidateRow> for PatternCandidate {
    type Error = DomainError;

    fn try_from(row: CandidateRow) -> Result<Self, Self::Error> {
        let detection_type = DetectionType::from_str(&row.detection_type).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid detection type: {}", row.detection_type))
        })?;
        let status = CandidateStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid candidate status: {}", row.status))
        })?;
        let files: BTreeSet<String> = serde_json::from_str(&row.files)?;
        let instances = serde_json::from_str(&row.instances)?;

        Ok(PatternCandidate {
            id: parse_uuid(&row.id)?,
            detection_type,
            description: row.description,
            description_hash: row.description_hash,
            count: u32::try_from(row.count).unwrap_or(0),
            files,
            instances,
            confidence_raw: row.confidence_raw,
            confidence_final: row.confidence_final,
            status,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProposalRow {
    id: String,
    candidate_id: String,
    proposal_type: String,
    title: String,
    description: String,
    proposed_content: String,
    proposed_path: Option<String>,
    confidence: f64,
    status: String,
    decision: Option<String>,
    edited_content: Option<String>,
    created_at: String,
    decided_at: Option<String>,
}

impl TryFrom<ProposalRow> for Proposal {
    type Error = DomainError;

    fn try_from(row: ProposalRow) -> Result<Self, Self::Error> {
        let proposal_type = ProposalType::from_str(&row.proposal_type).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid proposal type: {}", row.proposal_type))
        })?;
        let status = ProposalStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid proposal status: {}", row.status))
        })?;
        let decision = row
            .decision
            .map(|d| {
                Decision::from_str(&d)
                    .ok_or_else(|| DomainError::SerializationError(format!("Invalid decision: {d}")))
            })
            .transpose()?;

        Ok(Proposal {
            id: parse_uuid(&row.id)?,
            candidate_id: parse_uuid(&row.candidate_id)?,
            proposal_type,
            title: row.title,
            description: row.description,
            proposed_content: row.proposed_content,
            proposed_path: row.proposed_path,
            confidence: row.confidence,
            status,
            decision,
            edited_content: row.edited_content,
            created_at: parse_datetime(&row.created_at)?,
            decided_at: parse_optional_datetime(row.decided_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BaselineRow {
    id: String,
    proposal_id: String,
    rule_path: String,
    category: String,
    baseline_count: i64,
    baseline_window_days: i64,
    created_at: String,
}

impl TryFrom<BaselineRow> for RuleBaseline {
    type Error = DomainError;

    fn try_from(row: BaselineRow) -> Result<Self, Self::Error> {
        Ok(RuleBaseline {
            id: parse_uuid(&row.id)?,
            proposal_id: parse_uuid(&row.proposal_id)?,
            rule_path: row.rule_path,
            category: row.category,
            baseline_count: u64::try_from(row.baseline_count).unwrap_or(0),
            baseline_window_days: u32::try_from(row.baseline_window_days).unwrap_or(0),
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::Detection;
    use serde_json::json;

    async fn setup() -> SqliteLearningRepository {
        SqliteLearningRepository::new(create_migrated_test_pool().await.unwrap())
    }

    fn candidate(detection_type: DetectionType, description: &str) -> PatternCandidate {
        PatternCandidate::from_detection(
            Detection {
                detection_type,
                count: 3,
                confidence_raw: 0.4,
                files: ["src/a.rs".to_string(), "lib/b.rs".to_string()].into_iter().collect(),
                description: description.to_string(),
                instances: vec![json!({"timestamp": "2026-01-02T03:04:05Z"})
                    .as_object()
                    .cloned()
                    .unwrap()],
            },
            0.55,
        )
    }

    fn proposal_for(candidate: &PatternCandidate) -> Proposal {
        Proposal {
            id: Uuid::new_v4(),
            candidate_id: candidate.id,
            proposal_type: ProposalType::Rule,
            title: "Rule: x".to_string(),
            description: candidate.description.clone(),
            proposed_content: "content".to_string(),
            proposed_path: Some(".claude/rules/learned-x.md".to_string()),
            confidence: candidate.confidence_final,
            status: ProposalStatus::Pending,
            decision: None,
            edited_content: None,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    async fn decide(repo: &SqliteLearningRepository, proposal: &mut Proposal, decision: Decision) {
        proposal.status = decision.resulting_status();
        proposal.decision = Some(decision);
        proposal.decided_at = Some(Utc::now());
        repo.record_decision(proposal).await.unwrap();
    }

    #[tokio::test]
    async fn test_candidate_round_trip() {
        let repo = setup().await;
        let c = candidate(DetectionType::CodePattern, "wrap errors");
        repo.save_candidate(&c).await.unwrap();

        let loaded = repo.get_candidate(c.id).await.unwrap().unwrap();
        assert_eq!(loaded.files, c.files);
        assert_eq!(loaded.instances, c.instances);
        assert_eq!(loaded.description_hash, c.description_hash);
        assert_eq!(loaded.status, CandidateStatus::Pending);
        assert!(repo.get_candidate(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_candidate_status_moves_forward() {
        let repo = setup().await;
        let c = candidate(DetectionType::CodePattern, "wrap errors");
        repo.save_candidate(&c).await.unwrap();

        repo.update_candidate_status(c.id, CandidateStatus::Proposed).await.unwrap();
        assert_eq!(
            repo.list_candidates(Some(CandidateStatus::Proposed)).await.unwrap().len(),
            1
        );
        assert!(repo.list_candidates(Some(CandidateStatus::Pending)).await.unwrap().is_empty());
        assert!(matches!(
            repo.update_candidate_status(c.id, CandidateStatus::Pending).await,
            Err(DomainError::ValidationFailed(_))
        ));
        assert!(matches!(
            repo.update_candidate_status(Uuid::new_v4(), CandidateStatus::Decided).await,
            Err(DomainError::CandidateNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_proposal_round_trip_and_update() {
        let repo = setup().await;
        let c = candidate(DetectionType::CodePattern, "wrap errors");
        repo.save_candidate(&c).await.unwrap();
        let mut p = proposal_for(&c);
        repo.save_proposal(&p).await.unwrap();

        p.edited_content = Some("edited".to_string());
        decide(&repo, &mut p, Decision::Accept).await;

        let loaded = repo.get_proposal(p.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ProposalStatus::Accepted);
        assert_eq!(loaded.decision, Some(Decision::Accept));
        assert_eq!(loaded.edited_content.as_deref(), Some("edited"));
        assert!(loaded.decided_at.is_some());
        assert_eq!(repo.list_proposals(Some(ProposalStatus::Pending)).await.unwrap().len(), 0);
        assert_eq!(repo.list_proposals(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_decision_is_refused_by_the_store() {
        let repo = setup().await;
        let c = candidate(DetectionType::CodePattern, "wrap errors");
        repo.save_candidate(&c).await.unwrap();
        let p = proposal_for(&c);
        repo.save_proposal(&p).await.unwrap();

        let mut first = p.clone();
        let mut second = p.clone();
        decide(&repo, &mut first, Decision::Accept).await;

        second.status = Decision::Reject.resulting_status();
        second.decision = Some(Decision::Reject);
        second.decided_at = Some(Utc::now());
        match repo.record_decision(&second).await {
            Err(DomainError::AlreadyDecided { id, status }) => {
                assert_eq!(id, p.id);
                assert_eq!(status, "accepted");
            }
            other => panic!("expected AlreadyDecided, got {other:?}"),
        }
        let loaded = repo.get_proposal(p.id).await.unwrap().unwrap();
        assert_eq!(loaded.decision, Some(Decision::Accept));

        let mut missing = proposal_for(&c);
        missing.decision = Some(Decision::Ignore);
        assert!(matches!(
            repo.record_decision(&missing).await,
            Err(DomainError::ProposalNotFound(_))
        ));
    }

    #[test]
    fn test_cooldown_decisions_sql() {
        assert_eq!(cooldown_decisions_sql(), "'reject', 'ignore'");
    }

    #[tokio::test]
    async fn test_recent_rejections_and_decision_counts() {
        let repo = setup().await;
        let outcomes = [Decision::Accept, Decision::Reject, Decision::Ignore, Decision::Snooze];
        let mut hashes = Vec::new();
        for (i, decision) in outcomes.iter().enumerate() {
            let c = candidate(DetectionType::ImportPattern, &format!("pattern {i}"));
            repo.save_candidate(&c).await.unwrap();
            let mut p = proposal_for(&c);
            repo.save_proposal(&p).await.unwrap();
            decide(&repo, &mut p, *decision).await;
            hashes.push(c.description_hash.clone());
        }

        let recent = repo
            .recent_rejections(Utc::now() - chrono::Duration::days(7))
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent.contains_key(&hashes[1]));
        assert!(recent.contains_key(&hashes[2]));

        let counts = repo.decision_counts(DetectionType::ImportPattern).await.unwrap();
        assert_eq!(counts, DecisionCounts { accepted: 1, rejected: 2 });
        let none = repo.decision_counts(DetectionType::FixPattern).await.unwrap();
        assert_eq!(none.total(), 0);

        let later = repo
            .recent_rejections(Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert!(later.is_empty());
    }

    #[tokio::test]
    async fn test_baseline_round_trip() {
        let repo = setup().await;
        let c = candidate(DetectionType::CodePattern, "wrap errors");
        repo.save_candidate(&c).await.unwrap();
        let p = proposal_for(&c);
        repo.save_proposal(&p).await.unwrap();

        let baseline = RuleBaseline {
            id: Uuid::new_v4(),
            proposal_id: p.id,
            rule_path: ".claude/rules/learned-x.md".to_string(),
            category: "code_pattern".to_string(),
            baseline_count: 17,
            baseline_window_days: 30,
            created_at: Utc::now(),
        };
        repo.save_baseline(&baseline).await.unwrap();

        let loaded = repo.baseline_for_proposal(p.id).await.unwrap().unwrap();
        assert_eq!(loaded.baseline_count, 17);
        assert_eq!(loaded.category, "code_pattern");
        assert_eq!(repo.list_baselines().await.unwrap().len(), 1);
    }
}
