use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::authz::topology::{Candidate, CandidateSet, ControlEntry};

/// Outcome of an authorization query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    /// The rule that settled the outcome; `None` means no rule matched.
    pub deciding: Option<Candidate>,
    /// All matching rules, from most general to most specific.
    pub considered: Vec<Candidate>,
}

impl Decision {
    pub fn deny() -> Self {
        Self {
            allowed: false,
            deciding: None,
            considered: Vec::new(),
        }
    }
}

/// Put candidates in override order: general resources first, the target last.
///
/// Role and tag rules are merged and, at equal specificity, allows are placed
/// before denies so that a deny overrides.
pub fn order(set: CandidateSet) -> Vec<Candidate> {
    let CandidateSet { by_role, by_tag } = set;
    let mut merged: Vec<Candidate> = by_role.into_iter().chain(by_tag).collect();
    merged.sort_by(compare);
    merged
}

fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    b.specificity
        .cmp(&a.specificity)
        .then_with(|| b.allowed.cmp(&a.allowed))
}

/// Walk the ordered candidates starting from deny; each one overwrites the
/// running outcome, so the last (most specific) rule decides.
pub fn reduce(ordered: Vec<Candidate>) -> Decision {
    let mut allowed = false;
    let mut deciding = None;
    for candidate in &ordered {
        allowed = candidate.allowed;
        deciding = Some(candidate);
    }
    let deciding = deciding.cloned();
    Decision {
        allowed,
        deciding,
        considered: ordered,
    }
}

/// Order audit entries by resource specificity, then subject and action labels.
pub fn sort_controls(entries: &mut [ControlEntry]) {
    entries.sort_by(|a, b| {
        b.specificity
            .cmp(&a.specificity)
            .then_with(|| a.subject_label().cmp(b.subject_label()))
            .then_with(|| a.action_label().cmp(b.action_label()))
    });
}
