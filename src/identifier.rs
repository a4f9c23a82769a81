// 🔢 Identifier Extractor
// Finds an explicit 5-digit member number in a normalized reference.

use crate::entities::{Child, Roster};
use regex::Regex;
use std::sync::OnceLock;

fn ascii_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9A-Za-z_]+").expect("valid ascii word regex"))
}

/// Extract the single standalone 5-digit sequence from normalized text.
///
/// Only ASCII digits count, and only as a whole ASCII word. Returns `None`
/// when there is no such sequence or when two different ones appear. The
/// same number written twice still counts as one.
pub fn extract_member_number(normalized: &str) -> Option<&str> {
    let mut found: Option<&str> = None;

    let candidates = ascii_word_re()
        .find_iter(normalized)
        .map(|m| m.as_str())
        .filter(|w| w.len() == 5 && w.bytes().all(|b| b.is_ascii_digit()));

    for number in candidates {
        match found {
            None => found = Some(number),
            Some(existing) if existing == number => {}
            Some(_) => return None,
        }
    }

    found
}

/// Resolve the member number in `normalized` to exactly one child.
pub fn resolve_member<'r>(normalized: &str, roster: &'r Roster) -> Option<&'r Child> {
    let number = extract_member_number(normalized)?;
    roster.find_by_member_number(number)
}
