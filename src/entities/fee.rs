// 🧾 Fee Obligations - what a child's family still owes, per period

use crate::money::Money;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// FEE OBLIGATION
// ============================================================================

/// Amount owed for one child for one billing period.
///
/// Supplied by the caller. Only the reconciliation fold changes
/// `amount_paid` and `settled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeObligation {
    pub id: String,
    pub child_id: String,

    /// First day of the billing period
    pub period: NaiveDate,

    pub amount_due: Money,

    #[serde(default)]
    pub amount_paid: Money,

    #[serde(default)]
    pub settled: bool,
}

impl FeeObligation {
    pub fn new(id: &str, child_id: &str, period: NaiveDate, amount_due: Money) -> Self {
        FeeObligation {
            id: id.to_string(),
            child_id: child_id.to_string(),
            period,
            amount_due,
            amount_paid: Money::ZERO,
            settled: false,
        }
    }

    pub fn outstanding(&self) -> Money {
        if self.settled {
            return Money::ZERO;
        }
        let rest = self.amount_due - self.amount_paid;
        if rest.is_positive() {
            rest
        } else {
            Money::ZERO
        }
    }

    pub fn is_open(&self) -> bool {
        !self.settled && self.outstanding().is_positive()
    }

    /// Apply up to `available` to this obligation.
    ///
    /// Returns the amount actually consumed. Marks the obligation settled
    /// once nothing is outstanding.
    pub fn apply(&mut self, available: Money) -> Money {
        if !available.is_positive() || !self.is_open() {
            return Money::ZERO;
        }

        let applied = available.min(self.outstanding());
        self.amount_paid += applied;
        if self.outstanding().is_zero() {
            self.settled = true;
        }
        applied
    }
}

// ============================================================================
// OBLIGATION BOOK
// ============================================================================

/// Working set of obligations for one reconciliation run, indexed by child.
#[derive(Debug, Clone, Default)]
pub struct ObligationBook {
    obligations: Vec<FeeObligation>,
    by_child: HashMap<String, Vec<usize>>,
}

impl ObligationBook {
    /// Index obligations per child, oldest period first (ties by id).
    pub fn new(obligations: Vec<FeeObligation>) -> Self {
        let mut by_child: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, ob) in obligations.iter().enumerate() {
            by_child.entry(ob.child_id.clone()).or_default().push(idx);
        }

        for indices in by_child.values_mut() {
            indices.sort_by(|&a, &b| {
                let (oa, ob) = (&obligations[a], &obligations[b]);
                oa.period.cmp(&ob.period).then_with(|| oa.id.cmp(&ob.id))
            });
        }

        ObligationBook { obligations, by_child }
    }

    /// Index of the oldest still-open obligation for `child_id`.
    pub fn oldest_open(&self, child_id: &str) -> Option<usize> {
        self.by_child
            .get(child_id)?
            .iter()
            .copied()
            .find(|&idx| self.obligations[idx].is_open())
    }

    pub fn has_open(&self, child_id: &str) -> bool {
        self.oldest_open(child_id).is_some()
    }

    pub fn get(&self, idx: usize) -> &FeeObligation {
        &self.obligations[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut FeeObligation {
        &mut self.obligations[idx]
    }

    pub fn total_outstanding(&self) -> Money {
        self.obligations.iter().map(|o| o.outstanding()).sum()
    }

    pub fn into_obligations(self) -> Vec<FeeObligation> {
        self.obligations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, 1).unwrap()
    }

    #[test]
    fn test_apply_partial_keeps_open() {
        let mut ob = FeeObligation::new("o1", "c1", month(3), Money::from_minor(10000));
        let used = ob.apply(Money::from_minor(4000));

        assert_eq!(used, Money::from_minor(4000));
        assert_eq!(ob.outstanding(), Money::from_minor(6000));
        assert!(ob.is_open());
        assert!(!ob.settled);
    }

    #[test]
    fn test_apply_overpayment_consumes_only_outstanding() {
        let mut ob = FeeObligation::new("o1", "c1", month(3), Money::from_minor(10000));
        let used = ob.apply(Money::from_minor(15000));

        assert_eq!(used, Money::from_minor(10000));
        assert!(ob.settled);
        assert_eq!(ob.apply(Money::from_minor(100)), Money::ZERO);
    }

    #[test]
    fn test_settled_flag_closes_obligation() {
        let mut ob = FeeObligation::new("o1", "c1", month(3), Money::from_minor(10000));
        ob.settled = true;
        assert!(!ob.is_open());
        assert_eq!(ob.outstanding(), Money::ZERO);
    }

    #[test]
    fn test_book_oldest_open_first() {
        let book = ObligationBook::new(vec![
            FeeObligation::new("may", "c1", month(5), Money::from_minor(100)),
            FeeObligation::new("apr", "c1", month(4), Money::from_minor(100)),
            FeeObligation::new("other", "c2", month(1), Money::from_minor(100)),
        ]);

        let idx = book.oldest_open("c1").unwrap();
        assert_eq!(book.get(idx).id, "apr");
        assert!(book.oldest_open("nobody").is_none());
    }

    #[test]
    fn test_book_skips_settled() {
        let mut book = ObligationBook::new(vec![
            FeeObligation::new("apr", "c1", month(4), Money::from_minor(100)),
            FeeObligation::new("may", "c1", month(5), Money::from_minor(100)),
        ]);

        let idx = book.oldest_open("c1").unwrap();
        book.get_mut(idx).apply(Money::from_minor(100));

        let next = book.oldest_open("c1").unwrap();
        assert_eq!(book.get(next).id, "may");
        assert_eq!(book.total_outstanding(), Money::from_minor(100));
    }

    #[test]
    fn test_obligation_json_defaults() {
        let json = r#"{"id":"o1","child_id":"c1","period":"2024-05-01","amount_due":12000}"#;
        let ob: FeeObligation = serde_json::from_str(json).unwrap();
        assert_eq!(ob.amount_paid, Money::ZERO);
        assert!(ob.is_open());
    }
}
