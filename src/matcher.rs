// 🔍 Name Matcher - who does this payment belong to?
//
// Strategies, strongest first:
//   1. Identifier   - a 5-digit member number in the reference (authoritative)
//   2. DirectName   - child's name appears in the reference / payer name
//   3. ParentName   - a linked parent's name appears instead
//
// Name scores come from substring containment only, so adding unrelated
// text to a reference can never lower a score.

use crate::entities::{Child, Roster};
use crate::identifier::resolve_member;
use crate::normalize::{normalize, strip_non_alphanumeric};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scores below this are discarded
pub const ACCEPTANCE_THRESHOLD: f64 = 0.5;

pub const SCORE_EXACT_PHRASE: f64 = 0.85;
pub const SCORE_COMPACT_PHRASE: f64 = 0.85;
pub const SCORE_BOTH_NAMES: f64 = 0.80;
pub const SCORE_LAST_NAME_WITH_INITIAL: f64 = 0.75;
pub const SCORE_LAST_NAME: f64 = 0.60;
pub const SCORE_FIRST_NAME: f64 = 0.40;

const MIN_LAST_NAME_LEN: usize = 3;
const MIN_FIRST_NAME_LEN: usize = 4;

// ============================================================================
// MATCH CANDIDATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBasis {
    Identifier,
    DirectName,
    ParentName,
}

impl MatchBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchBasis::Identifier => "identifier",
            MatchBasis::DirectName => "direct_name",
            MatchBasis::ParentName => "parent_name",
        }
    }
}

/// A child identified for one transaction. Never below the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub child_id: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
    pub basis: MatchBasis,
}

// ============================================================================
// NAME SCORING
// ============================================================================

/// A (first, last) pair prepared once for repeated scoring.
#[derive(Debug, Clone)]
pub struct NameKey {
    first: String,
    last: String,
    first_compact: String,
    last_compact: String,
    raw_first_len: usize,
    raw_last_len: usize,
}

impl NameKey {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        let first = normalize(first_name);
        let last = normalize(last_name);
        NameKey {
            first_compact: strip_non_alphanumeric(&first),
            last_compact: strip_non_alphanumeric(&last),
            first,
            last,
            raw_first_len: first_name.trim().chars().count(),
            raw_last_len: last_name.trim().chars().count(),
        }
    }

    /// Score an already-normalized reference. First rule that fires wins.
    pub fn score(&self, reference: &str) -> f64 {
        let (first, last) = (self.first.as_str(), self.last.as_str());
        let has_first = !first.is_empty() && reference.contains(first);
        let has_last = !last.is_empty() && reference.contains(last);

        if !first.is_empty() && !last.is_empty() {
            let phrases = [
                format!("{} {}", first, last),
                format!("{} {}", last, first),
                format!("{}, {}", last, first),
                format!("{} , {}", last, first),
            ];
            if phrases.iter().any(|p| reference.contains(p.as_str())) {
                return SCORE_EXACT_PHRASE;
            }
        }

        if !self.first_compact.is_empty() && !self.last_compact.is_empty() {
            let compact = strip_non_alphanumeric(reference);
            let first_last = format!("{}{}", self.first_compact, self.last_compact);
            let last_first = format!("{}{}", self.last_compact, self.first_compact);
            if compact.contains(&first_last) || compact.contains(&last_first) {
                return SCORE_COMPACT_PHRASE;
            }
        }

        if has_first && has_last {
            return SCORE_BOTH_NAMES;
        }

        if has_last && self.raw_last_len >= MIN_LAST_NAME_LEN {
            let with_initial = first
                .chars()
                .next()
                .map(|initial| reference.contains(&format!("{}.", initial)))
                .unwrap_or(false);
            return if with_initial {
                SCORE_LAST_NAME_WITH_INITIAL
            } else {
                SCORE_LAST_NAME
            };
        }

        if has_first && self.raw_first_len >= MIN_FIRST_NAME_LEN {
            return SCORE_FIRST_NAME;
        }

        0.0
    }
}

/// Score a normalized reference against a raw (first, last) name.
pub fn score_name(reference: &str, first_name: &str, last_name: &str) -> f64 {
    NameKey::new(first_name, last_name).score(reference)
}

// ============================================================================
// PERSON MATCHER
// ============================================================================

struct ChildProfile {
    name: NameKey,
    parents: Vec<NameKey>,
}

/// Identifies the child a payment belongs to, against one roster snapshot.
pub struct PersonMatcher<'r> {
    roster: &'r Roster,
    profiles: Vec<ChildProfile>,
    threshold: f64,
}

impl<'r> PersonMatcher<'r> {
    pub fn new(roster: &'r Roster) -> Self {
        Self::with_threshold(roster, ACCEPTANCE_THRESHOLD)
    }

    pub fn with_threshold(roster: &'r Roster, threshold: f64) -> Self {
        let profiles = roster
            .children()
            .iter()
            .map(|c| ChildProfile {
                name: NameKey::new(&c.first_name, &c.last_name),
                parents: c
                    .parents
                    .iter()
                    .map(|p| NameKey::new(&p.first_name, &p.last_name))
                    .collect(),
            })
            .collect();

        PersonMatcher {
            roster,
            profiles,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Resolve a child from a transaction's reference text and payer name.
    ///
    /// A member number that resolves to exactly one child wins outright.
    /// Otherwise the best name score over direct and parent matches counts;
    /// on a tie the direct match and then the earlier roster entry win.
    pub fn identify(&self, description: Option<&str>, payer_name: Option<&str>) -> Option<MatchCandidate> {
        let description = description.map(normalize);
        let payer_name = payer_name.map(normalize);

        if let Some(child) = description.as_deref().and_then(|d| resolve_member(d, self.roster)) {
            debug!(child = %child.id, "resolved by member number");
            return Some(MatchCandidate {
                child_id: child.id.clone(),
                confidence: 1.0,
                basis: MatchBasis::Identifier,
            });
        }

        let texts: Vec<&str> = [description.as_deref(), payer_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|t| !t.is_empty())
            .collect();
        if texts.is_empty() {
            return None;
        }

        let direct = self.best_by(&texts, |p| std::slice::from_ref(&p.name));
        let via_parent = self.best_by(&texts, |p| p.parents.as_slice());

        let (idx, confidence, basis) = match (direct, via_parent) {
            (Some((_, ds)), Some((pi, ps))) if ps > ds => (pi, ps, MatchBasis::ParentName),
            (Some((di, ds)), _) => (di, ds, MatchBasis::DirectName),
            (None, Some((pi, ps))) => (pi, ps, MatchBasis::ParentName),
            (None, None) => return None,
        };

        if confidence < self.threshold {
            return None;
        }

        let child: &Child = &self.roster.children()[idx];
        debug!(child = %child.id, confidence, basis = basis.as_str(), "resolved by name");
        Some(MatchCandidate {
            child_id: child.id.clone(),
            confidence,
            basis,
        })
    }

    /// Highest-scoring child (index, score); first seen wins ties. Zero scores are ignored.
    fn best_by<F>(&self, texts: &[&str], keys: F) -> Option<(usize, f64)>
    where
        F: Fn(&ChildProfile) -> &[NameKey],
    {
        let mut best: Option<(usize, f64)> = None;

        for (idx, profile) in self.profiles.iter().enumerate() {
            let score = keys(profile)
                .iter()
                .flat_map(|key| texts.iter().map(move |t| key.score(t)))
                .fold(0.0_f64, f64::max);

            if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((idx, score));
            }
        }

        best
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Parent;
    use proptest::prelude::*;

    fn score(reference: &str, first: &str, last: &str) -> f64 {
        score_name(&normalize(reference), first, last)
    }

    #[test]
    fn test_umlaut_name_in_reference() {
        assert_eq!(score("Mueller Lisa Beitrag Mai", "Lisa", "Müller"), 0.85);
    }

    #[test]
    fn test_unrelated_last_name_scores_zero() {
        // "lisa" is exactly 4 chars, so the first-name rule gives 0.4, below threshold
        let s = score("Mueller Lisa Beitrag Mai", "Lisa", "Schmidt");
        assert!(s < ACCEPTANCE_THRESHOLD);
        assert_eq!(score("Mueller Beitrag Mai", "Lisa", "Schmidt"), 0.0);
    }

    #[test]
    fn test_phrase_variants() {
        assert_eq!(score("Beitrag Lisa Müller", "Lisa", "Müller"), SCORE_EXACT_PHRASE);
        assert_eq!(score("Müller, Lisa", "Lisa", "Müller"), SCORE_EXACT_PHRASE);
        assert_eq!(score("Müller , Lisa", "Lisa", "Müller"), SCORE_EXACT_PHRASE);
    }

    #[test]
    fn test_compact_phrase() {
        assert_eq!(score("LisaMueller Mai", "Lisa", "Müller"), SCORE_COMPACT_PHRASE);
        assert_eq!(score("Mueller-Lisa", "Lisa", "Müller"), SCORE_COMPACT_PHRASE);
    }

    #[test]
    fn test_both_names_apart() {
        assert_eq!(score("Lisa Beitrag Familie Müller", "Lisa", "Müller"), SCORE_BOTH_NAMES);
    }

    #[test]
    fn test_last_name_with_initial() {
        assert_eq!(score("L. Müller Beitrag", "Lisa", "Müller"), SCORE_LAST_NAME_WITH_INITIAL);
    }

    #[test]
    fn test_last_name_only() {
        assert_eq!(score("Familie Müller Beitrag", "Lisa", "Müller"), SCORE_LAST_NAME);
    }

    #[test]
    fn test_short_last_name_ignored() {
        assert_eq!(score("Familie Li Beitrag", "Anna", "Li"), 0.0);
    }

    #[test]
    fn test_first_name_only() {
        assert_eq!(score("Beitrag fuer Lisa", "Lisa", "Müller"), SCORE_FIRST_NAME);
        assert_eq!(score("Beitrag fuer Tom", "Tom", "Müller"), 0.0);
    }

    #[test]
    fn test_empty_names_never_match() {
        assert_eq!(score("anything at all", "", ""), 0.0);
    }

    fn roster() -> Roster {
        Roster::new(vec![
            Child::new("lisa", "Lisa", "Müller", "12345").with_parent(Parent::new("Maria", "Müller")),
            Child::new("ben", "Ben", "Schmidt", "22222").with_parent(Parent::new("Karin", "Weber")),
        ])
    }

    #[test]
    fn test_identify_direct() {
        let roster = roster();
        let m = PersonMatcher::new(&roster);
        let c = m.identify(Some("Beitrag Mai Ben Schmidt"), None).unwrap();
        assert_eq!(c.child_id, "ben");
        assert_eq!(c.basis, MatchBasis::DirectName);
        assert_eq!(c.confidence, 0.85);
    }

    #[test]
    fn test_identify_via_parent_payer() {
        let roster = roster();
        let m = PersonMatcher::new(&roster);
        let c = m.identify(Some("Kita Beitrag Mai"), Some("WEBER, KARIN")).unwrap();
        assert_eq!(c.child_id, "ben");
        assert_eq!(c.basis, MatchBasis::ParentName);
    }

    #[test]
    fn test_identifier_beats_name() {
        let roster = roster();
        let m = PersonMatcher::new(&roster);
        let c = m.identify(Some("Ben Schmidt Mitgliedsnr 12345"), None).unwrap();
        assert_eq!(c.child_id, "lisa");
        assert_eq!(c.basis, MatchBasis::Identifier);
    }

    #[test]
    fn test_unknown_identifier_falls_through() {
        let roster = roster();
        let m = PersonMatcher::new(&roster);
        let c = m.identify(Some("Ben Schmidt 99999"), None).unwrap();
        assert_eq!(c.child_id, "ben");
        assert_eq!(c.basis, MatchBasis::DirectName);
    }

    #[test]
    fn test_below_threshold_discarded() {
        let roster = roster();
        let m = PersonMatcher::new(&roster);
        assert!(m.identify(Some("Beitrag fuer Lisa"), None).is_none());
        assert!(m.identify(None, None).is_none());
        assert!(m.identify(Some("   "), Some("")).is_none());
    }

    #[test]
    fn test_tie_prefers_direct_match() {
        // Parent shares the child's name: both score 0.85
        let roster = Roster::new(vec![
            Child::new("a", "Anna", "Weber", "11111"),
            Child::new("b", "Paul", "Weber", "22222").with_parent(Parent::new("Anna", "Weber")),
        ]);
        let m = PersonMatcher::new(&roster);
        let c = m.identify(Some("Anna Weber"), None).unwrap();
        assert_eq!(c.child_id, "a");
        assert_eq!(c.basis, MatchBasis::DirectName);
    }

    #[test]
    fn test_higher_parent_score_wins() {
        let roster = Roster::new(vec![
            Child::new("a", "Lena", "Krause", "11111"),
            Child::new("b", "Paul", "Brandt", "22222").with_parent(Parent::new("Sabine", "Brandt")),
        ]);
        let m = PersonMatcher::new(&roster);
        // "krause" alone is 0.60 direct; "sabine brandt" is 0.85 via parent
        let c = m.identify(Some("Sabine Brandt fuer Krause"), None).unwrap();
        assert_eq!(c.child_id, "b");
        assert_eq!(c.basis, MatchBasis::ParentName);
    }

    #[test]
    fn test_custom_threshold() {
        let roster = roster();
        let m = PersonMatcher::with_threshold(&roster, 0.3);
        let c = m.identify(Some("Beitrag fuer Lisa"), None).unwrap();
        assert_eq!(c.child_id, "lisa");
        assert_eq!(c.confidence, SCORE_FIRST_NAME);
    }

    proptest! {
        #[test]
        fn prop_appending_text_never_lowers_score(
            base in "[A-Za-zäöü ,.]{0,30}",
            suffix in "[A-Za-z0-9 ]{0,30}",
        ) {
            let before = score(&base, "Lisa", "Müller");
            let after = score(&format!("{} {}", base, suffix), "Lisa", "Müller");
            prop_assert!(after >= before);
        }
    }
}
