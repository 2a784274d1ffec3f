//! Turns scored candidates into reviewable artifact proposals.

use chrono::Utc;
use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::domain::models::{
    LearningConfig, PatternCandidate, Proposal, ProposalStatus, ProposalType,
};
use crate::domain::ports::ExistingRule;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "were", "into", "when",
    "then", "than", "have", "has", "had", "not", "but", "all", "any", "can", "should", "must",
    "will", "its", "our", "your", "their", "each", "via", "per", "also", "more", "most", "such",
    "these", "those", "been", "being", "only", "over", "under", "about", "after", "before",
    "use", "uses", "used", "using", "always", "never",
];

const REVIEW_QUESTIONS: [&str; 4] = [
    "Is this pattern intentional and worth codifying?",
    "Does it conflict with any existing rule?",
    "Is the scope right: which files or directories should it apply to?",
    "What is the most concise, enforceable statement of it?",
];

const MAX_EXAMPLE_INSTANCES: usize = 3;
const MAX_SLUG_LEN: usize = 48;

/// Generator settings, taken from the learning config.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub max_proposals: usize,
    pub similarity_threshold: f64,
    pub rules_dir: PathBuf,
}

impl From<&LearningConfig> for GeneratorConfig {
    fn from(config: &LearningConfig) -> Self {
        Self {
            max_proposals: config.max_proposals_per_session,
            similarity_threshold: config.similarity_threshold,
            rules_dir: PathBuf::from(&config.rules_dir),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::from(&LearningConfig::default())
    }
}

pub struct ProposalGenerator {
    config: GeneratorConfig,
}

impl ProposalGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Build proposals for candidates in input order, up to the session cap.
    ///
    /// A candidate is skipped when its description hash was already emitted
    /// in this batch or when an existing rule covers it.
    pub fn generate(
        &self,
        candidates: &[PatternCandidate],
        existing_rules: &[ExistingRule],
    ) -> Vec<Proposal> {
        let rule_words: Vec<BTreeSet<String>> = existing_rules
            .iter()
            .map(|rule| tokenize(&rule.content))
            .collect();
        let mut emitted: HashSet<&str> = HashSet::new();
        let mut proposals = Vec::new();

        for (index, candidate) in candidates.iter().enumerate() {
            if proposals.len() >= self.config.max_proposals {
                tracing::debug!(
                    cap = self.config.max_proposals,
                    deferred = candidates.len() - index,
                    "proposal cap reached"
                );
                break;
            }
            if !emitted.insert(candidate.description_hash.as_str()) {
                continue;
            }

            let keywords = extract_keywords(&candidate.description);
            let covered = existing_rules.iter().zip(&rule_words).find(|(_, words)| {
                keyword_overlap(&keywords, words) > self.config.similarity_threshold
            });
            if let Some((rule, _)) = covered {
                tracing::debug!(
                    candidate = %candidate.id,
                    rule = %rule.path,
                    "candidate already covered by an existing rule"
                );
                continue;
            }

            proposals.push(self.build(candidate));
        }

        proposals
    }

    fn build(&self, candidate: &PatternCandidate) -> Proposal {
        let proposal_type = ProposalType::for_detection(candidate.detection_type);
        let slug = slugify(&candidate.description);
        let proposed_path = artifact_path(&self.config.rules_dir, proposal_type, &slug);

        Proposal {
            id: Uuid::new_v4(),
            candidate_id: candidate.id,
            proposal_type,
            title: format!("{}: {}", type_label(proposal_type), title_text(&candidate.description)),
            description: candidate.description.clone(),
            proposed_content: build_prompt(candidate, proposal_type),
            proposed_path: Some(proposed_path.to_string_lossy().into_owned()),
            confidence: candidate.confidence_final,
            status: ProposalStatus::Pending,
            decision: None,
            edited_content: None,
            created_at: Utc::now(),
            decided_at: None,
        }
    }
}

/// Where the artifact for a proposal lands. Rules live in `rules_dir`;
/// other artifacts in sibling directories of it.
pub fn artifact_path(rules_dir: &Path, proposal_type: ProposalType, slug: &str) -> PathBuf {
    let base = rules_dir.parent().unwrap_or_else(|| Path::new(""));
    match proposal_type {
        ProposalType::Rule => rules_dir.join(format!("learned-{slug}.md")),
        ProposalType::Template => base.join("templates").join(format!("{slug}.md")),
        ProposalType::Adr => base.join("adr").join(format!("{slug}.md")),
        ProposalType::Skill => base.join("skills").join(format!("{slug}.md")),
        ProposalType::ProjectGraph => base.join("project-graph").join(format!("{slug}.json")),
    }
}

fn type_label(proposal_type: ProposalType) -> &'static str {
    match proposal_type {
        ProposalType::Rule => "Rule",
        ProposalType::Adr => "ADR",
        ProposalType::Template => "Template",
        ProposalType::ProjectGraph => "Project graph",
        ProposalType::Skill => "Skill",
    }
}

fn title_text(description: &str) -> String {
    let first_line = description.lines().next().unwrap_or("").trim();
    if first_line.chars().count() > 72 {
        let cut: String = first_line.chars().take(69).collect();
        format!("{cut}...")
    } else {
        first_line.to_string()
    }
}

fn build_prompt(candidate: &PatternCandidate, proposal_type: ProposalType) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## Proposed {}\n", type_label(proposal_type).to_lowercase());
    let _ = writeln!(out, "{}\n", candidate.description);
    let _ = writeln!(out, "- Detection type: {}", candidate.detection_type);
    let _ = writeln!(out, "- Occurrences: {}", candidate.count);
    let _ = writeln!(out, "- Confidence: {:.2}", candidate.confidence_final);

    out.push_str("\n### Files\n");
    for file in &candidate.files {
        let _ = writeln!(out, "- {file}");
    }

    if !candidate.instances.is_empty() {
        out.push_str("\n### Example instances\n");
        for instance in candidate.instances.iter().take(MAX_EXAMPLE_INSTANCES) {
            let value = serde_json::Value::Object(instance.clone());
            let _ = writeln!(out, "```json\n{value:#}\n```");
        }
    }

    out.push_str("\n### Review questions\n");
    for (i, question) in REVIEW_QUESTIONS.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, question);
    }
    out
}

/// Lowercased words of three or more characters.
fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

/// Description keywords with stop-words removed.
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    let mut words = tokenize(text);
    words.retain(|w| !STOP_WORDS.contains(&w.as_str()));
    words
}

/// Share of `keywords` present in `rule_words`; 0.0 for no keywords.
pub fn keyword_overlap(keywords: &BTreeSet<String>, rule_words: &BTreeSet<String>) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let shared = keywords.intersection(rule_words).count();
    shared as f64 / keywords.len() as f64
}

/// File-name-safe slug of a description.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for word in text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let word = word.to_ascii_lowercase();
        if !slug.is_empty() && slug.len() + 1 + word.len() > MAX_SLUG_LEN {
            break;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word);
    }
    slug.truncate(MAX_SLUG_LEN);
    if slug.is_empty() {
        slug.push_str("pattern");
    }
    slug
}
