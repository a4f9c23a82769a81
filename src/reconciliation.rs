// ⚖️ Reconciliation Engine - assign payments to outstanding fees
//
// Per transaction, oldest booking date first:
//   identify child → oldest open obligation → apply → cascade remainder
//
// Identification is pure and runs in parallel. Settlement is a strict
// ordered fold: a later payment sees what earlier payments already settled.

use crate::entities::{FeeObligation, ObligationBook, Roster};
use crate::matcher::{MatchBasis, MatchCandidate, PersonMatcher, ACCEPTANCE_THRESHOLD};
use crate::money::Money;
use crate::transaction::BankTransaction;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

// ============================================================================
// OUTPUT RECORDS
// ============================================================================

/// One (transaction, obligation) pairing. A payment that spans several
/// periods produces one record per period it paid into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMatch {
    pub transaction_id: String,
    pub obligation_id: String,
    pub child_id: String,
    pub period: NaiveDate,
    /// Portion of the transaction applied to this obligation
    pub amount: Money,
    pub confidence: f64,
    pub basis: MatchBasis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Nobody on the roster was identified
    NoPersonIdentified,
    /// A child was identified but owes nothing
    NoOpenObligation,
}

impl UnresolvedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnresolvedReason::NoPersonIdentified => "no_person_identified",
            UnresolvedReason::NoOpenObligation => "no_open_obligation",
        }
    }
}

/// Transaction left for manual review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedTransaction {
    pub transaction_id: String,
    pub booking_date: NaiveDate,
    pub amount: Money,
    pub reason: UnresolvedReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<MatchCandidate>,
}

/// Money left over after every open obligation of the child was settled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnappliedCredit {
    pub transaction_id: String,
    pub child_id: String,
    pub amount: Money,
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub matches: Vec<PaymentMatch>,
    pub unresolved: Vec<UnresolvedTransaction>,
    pub unapplied_credits: Vec<UnappliedCredit>,

    /// Obligation snapshot after settlement, for the caller to persist
    pub obligations: Vec<FeeObligation>,

    pub transactions_processed: usize,

    /// Debits and zero amounts are not payments and are left alone
    pub ignored_debits: usize,

    /// Transactions not reached before the deadline
    pub pending: usize,

    pub reconciled_at: chrono::DateTime<chrono::Utc>,
}

impl ReconciliationReport {
    pub fn matched_transaction_count(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.transaction_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn unresolved_count(&self, reason: UnresolvedReason) -> usize {
        self.unresolved.iter().filter(|u| u.reason == reason).count()
    }

    pub fn total_applied(&self) -> Money {
        self.matches.iter().map(|m| m.amount).sum()
    }

    pub fn matches_for_transaction(&self, transaction_id: &str) -> Vec<&PaymentMatch> {
        self.matches
            .iter()
            .filter(|m| m.transaction_id == transaction_id)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.pending == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciled {} transactions: {} matched ({} applied), {} without person, {} without open fee, {} unapplied credits, {} debits ignored, {} pending",
            self.transactions_processed,
            self.matched_transaction_count(),
            self.total_applied(),
            self.unresolved_count(UnresolvedReason::NoPersonIdentified),
            self.unresolved_count(UnresolvedReason::NoOpenObligation),
            self.unapplied_credits.len(),
            self.ignored_debits,
            self.pending
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    /// Minimum confidence for a name match (default: 0.5)
    pub threshold: f64,

    /// Stop between transactions once this instant has passed
    pub deadline: Option<Instant>,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            threshold: ACCEPTANCE_THRESHOLD,
            deadline: None,
        }
    }

    pub fn with_threshold(threshold: f64) -> Self {
        ReconciliationEngine {
            threshold,
            deadline: None,
        }
    }

    /// Builder pattern: stop early once `deadline` passes
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Reconcile a batch of transactions against a roster and the open fees.
    ///
    /// Transactions are processed in ascending booking-date order regardless
    /// of input order (stable for equal dates).
    pub fn reconcile(
        &self,
        transactions: &[BankTransaction],
        roster: &Roster,
        obligations: Vec<FeeObligation>,
    ) -> ReconciliationReport {
        let deadline = self.deadline;
        self.reconcile_until(transactions, roster, obligations, || {
            deadline.map_or(false, |d| Instant::now() >= d)
        })
    }

    /// Same as [`reconcile`](Self::reconcile), but asks `should_stop` before
    /// each transaction. Once it answers `true` the remaining transactions
    /// are left untouched and counted as pending.
    pub fn reconcile_until<F>(
        &self,
        transactions: &[BankTransaction],
        roster: &Roster,
        obligations: Vec<FeeObligation>,
        mut should_stop: F,
    ) -> ReconciliationReport
    where
        F: FnMut() -> bool,
    {
        let mut ordered: Vec<&BankTransaction> = transactions.iter().collect();
        ordered.sort_by_key(|tx| tx.booking_date);

        let matcher = PersonMatcher::with_threshold(roster, self.threshold);
        let candidates: Vec<Option<MatchCandidate>> = ordered
            .par_iter()
            .map(|tx| {
                if tx.is_credit() {
                    matcher.identify(tx.description.as_deref(), tx.payer_name.as_deref())
                } else {
                    None
                }
            })
            .collect();

        let mut book = ObligationBook::new(obligations);
        let mut report = ReconciliationReport {
            matches: Vec::new(),
            unresolved: Vec::new(),
            unapplied_credits: Vec::new(),
            obligations: Vec::new(),
            transactions_processed: 0,
            ignored_debits: 0,
            pending: 0,
            reconciled_at: chrono::Utc::now(),
        };

        for (position, (tx, candidate)) in ordered.iter().zip(candidates).enumerate() {
            if should_stop() {
                report.pending = ordered.len() - position;
                warn!(pending = report.pending, "deadline reached, stopping reconciliation");
                break;
            }

            report.transactions_processed += 1;

            if !tx.is_credit() {
                report.ignored_debits += 1;
                continue;
            }

            match candidate {
                None => {
                    debug!(tx = %tx.id, "no person identified");
                    report.unresolved.push(UnresolvedTransaction {
                        transaction_id: tx.id.clone(),
                        booking_date: tx.booking_date,
                        amount: tx.amount,
                        reason: UnresolvedReason::NoPersonIdentified,
                        candidate: None,
                    });
                }
                Some(candidate) => self.settle(tx, candidate, &mut book, &mut report),
            }
        }

        report.obligations = book.into_obligations();

        info!("{}", report.summary());
        report
    }

    /// Apply one payment to the child's open obligations, oldest first,
    /// cascading any remainder into the next one.
    fn settle(
        &self,
        tx: &BankTransaction,
        candidate: MatchCandidate,
        book: &mut ObligationBook,
        report: &mut ReconciliationReport,
    ) {
        if !book.has_open(&candidate.child_id) {
            debug!(tx = %tx.id, child = %candidate.child_id, "no open obligation");
            report.unresolved.push(UnresolvedTransaction {
                transaction_id: tx.id.clone(),
                booking_date: tx.booking_date,
                amount: tx.amount,
                reason: UnresolvedReason::NoOpenObligation,
                candidate: Some(candidate),
            });
            return;
        }

        let mut remaining = tx.amount;
        while remaining.is_positive() {
            let Some(idx) = book.oldest_open(&candidate.child_id) else {
                break;
            };

            let obligation = book.get_mut(idx);
            let applied = obligation.apply(remaining);
            remaining -= applied;

            report.matches.push(PaymentMatch {
                transaction_id: tx.id.clone(),
                obligation_id: obligation.id.clone(),
                child_id: candidate.child_id.clone(),
                period: obligation.period,
                amount: applied,
                confidence: candidate.confidence,
                basis: candidate.basis,
            });
        }

        if remaining.is_positive() {
            warn!(tx = %tx.id, child = %candidate.child_id, amount = %remaining, "unapplied credit");
            report.unapplied_credits.push(UnappliedCredit {
                transaction_id: tx.id.clone(),
                child_id: candidate.child_id,
                amount: remaining,
            });
        }
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
