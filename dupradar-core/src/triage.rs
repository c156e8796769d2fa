//! Threshold decision over ranked similarity candidates.
//!
//! Pure and deterministic: the same candidates, threshold and K always give
//! the same decision and the same text.

use std::fmt::Write;

use crate::models::SimilarityCandidate;

/// Footer appended to every triage comment.
pub const ATTRIBUTION_FOOTER: &str =
    "_This comment was generated automatically by DupRadar based on embedding similarity._";

const HEADER: &str = "Possible duplicate issues found:";

/// Threshold and K, as the decider needs them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriageSettings {
    pub similarity_threshold: f64,
    pub top_k: usize,
}

impl From<&crate::config::TriageConfig> for TriageSettings {
    fn from(config: &crate::config::TriageConfig) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
            top_k: config.top_k as usize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageDecision {
    NoComment,
    Comment(String),
}

impl TriageDecision {
    pub fn comment_text(&self) -> Option<&str> {
        match self {
            TriageDecision::NoComment => None,
            TriageDecision::Comment(text) => Some(text),
        }
    }
}

/// Decide whether to comment, given candidates sorted ascending by distance.
///
/// The listing is the contiguous prefix of `candidates` whose distance is
/// `<= threshold`, capped at `top_k`. The first candidate over the threshold
/// ends the listing; later candidates are never considered.
pub fn decide(
    candidates: &[SimilarityCandidate],
    similarity_threshold: f64,
    top_k: usize,
) -> TriageDecision {
    let matches: Vec<&SimilarityCandidate> = candidates
        .iter()
        .take(top_k)
        .take_while(|c| c.distance <= similarity_threshold)
        .collect();

    if matches.is_empty() {
        return TriageDecision::NoComment;
    }

    let mut text = String::from(HEADER);
    text.push_str("\n\n");
    for candidate in matches {
        // owner/name#N; a bare #N resolves against the commented repository
        let _ = writeln!(
            text,
            "- {}#{} (distance: {:.3})",
            candidate.repository, candidate.issue_number, candidate.distance
        );
    }
    text.push('\n');
    text.push_str(ATTRIBUTION_FOOTER);

    TriageDecision::Comment(text)
}

impl TriageSettings {
    pub fn decide(&self, candidates: &[SimilarityCandidate]) -> TriageDecision {
        decide(candidates, self.similarity_threshold, self.top_k)
    }
}
