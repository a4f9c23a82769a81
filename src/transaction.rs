// 🏦 Bank Transaction - one decoded row of a statement export
//
// Identity = id (UUID). Deduplication = idempotency hash.
// Immutable once the decoder has built it.

use crate::money::Money;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransaction {
    /// Stable identity (UUID)
    pub id: String,

    pub booking_date: NaiveDate,

    /// Settlement date; equals `booking_date` when the export had none
    pub value_date: NaiveDate,

    /// Payer as printed by the bank
    pub payer_name: Option<String>,

    /// Payer IBAN / account number
    pub payer_account: Option<String>,

    /// Free-text payment reference
    pub description: Option<String>,

    /// Signed amount; credits are positive
    pub amount: Money,

    /// ISO 4217 code
    pub currency: String,

    pub imported_at: DateTime<Utc>,

    /// 1-based line in the source file
    pub line_number: usize,

    /// How many identical rows came before this one in the same statement
    #[serde(default)]
    pub occurrence: usize,
}

impl BankTransaction {
    /// Fields that identify the same booking across exports, joined.
    ///
    /// Two genuine transfers can share all of them; `occurrence` tells
    /// those apart.
    pub fn content_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.booking_date,
            self.value_date,
            self.amount.minor(),
            self.currency,
            self.payer_account.as_deref().unwrap_or(""),
            self.description.as_deref().unwrap_or(""),
        )
    }

    /// SHA-256 over the content key and the occurrence index.
    pub fn idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}#{}", self.content_key(), self.occurrence));
        format!("{:x}", hasher.finalize())
    }

    pub fn is_credit(&self) -> bool {
        self.amount.is_positive()
    }
}
