// ✅ Import Quality - what the decoder skipped and why
//
// The decoder never aborts on a bad row. This report is how an operator
// finds out how many rows were dropped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// SKIP REASONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    TooFewFields,
    InvalidBookingDate,
    InvalidAmount,
    UnreadableRow,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::TooFewFields => "too_few_fields",
            SkipReason::InvalidBookingDate => "invalid_booking_date",
            SkipReason::InvalidAmount => "invalid_amount",
            SkipReason::UnreadableRow => "unreadable_row",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Severity {
    Warning, // Row was dropped
    Info,    // Row was kept with a fallback value
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowIssue {
    pub line: usize,
    pub severity: Severity,
    /// Skip reason code, or "value_date_fallback"
    pub code: String,
    pub detail: String,
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportQuality {
    /// Data rows seen (header excluded)
    pub rows_read: usize,
    pub rows_accepted: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub value_date_fallbacks: usize,
    pub issues: Vec<RowIssue>,
}

impl ImportQuality {
    pub fn record_accepted(&mut self) {
        self.rows_read += 1;
        self.rows_accepted += 1;
    }

    pub fn record_skip(&mut self, line: usize, reason: SkipReason, detail: String) {
        self.rows_read += 1;
        *self.skipped.entry(reason).or_insert(0) += 1;
        self.issues.push(RowIssue {
            line,
            severity: Severity::Warning,
            code: reason.as_str().to_string(),
            detail,
        });
    }

    pub fn record_value_date_fallback(&mut self, line: usize, detail: String) {
        self.value_date_fallbacks += 1;
        self.issues.push(RowIssue {
            line,
            severity: Severity::Info,
            code: "value_date_fallback".to_string(),
            detail,
        });
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn is_clean(&self) -> bool {
        self.skipped_total() == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows read, {} accepted, {} skipped, {} value-date fallbacks",
            self.rows_read,
            self.rows_accepted,
            self.skipped_total(),
            self.value_date_fallbacks
        )
    }
}
