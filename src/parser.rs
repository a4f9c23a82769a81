// 🏗️ Statement Decoder
// Windows-1252, semicolon-separated bank export → sorted BankTransactions
//
// Best effort: a malformed row is counted and dropped, the import goes on.
// Only a stream that cannot be read at all is an error.

use crate::data_quality::{ImportQuality, SkipReason};
use crate::error::{ImportError, ParseError};
use crate::locale::{parse_amount, parse_date};
use crate::transaction::BankTransaction;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// COLUMN LAYOUT
// ============================================================================

/// Minimum number of fields a data row must have
pub const MIN_FIELDS: usize = 13;

const COL_BOOKING_DATE: usize = 1;
const COL_VALUE_DATE: usize = 2;
const COL_DESCRIPTION: usize = 4;
const COL_PAYER_NAME: usize = 7;
const COL_PAYER_ACCOUNT: usize = 8;
const COL_AMOUNT: usize = 10;
const COL_CURRENCY: usize = 11;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Output of a decode run: transactions sorted by booking date, plus the audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedStatement {
    pub transactions: Vec<BankTransaction>,
    pub quality: ImportQuality,
}

/// BankParser - decode one export format into transactions
pub trait BankParser: Send + Sync {
    /// Decode a raw byte stream
    fn parse_bytes(&self, bytes: &[u8]) -> Result<DecodedStatement, ImportError>;

    /// Read and decode a file
    fn parse(&self, file_path: &Path) -> Result<DecodedStatement, ImportError> {
        let bytes = std::fs::read(file_path)?;
        self.parse_bytes(&bytes)
    }

    /// Parser version (for provenance tracking)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

/// Decode Windows-1252 bytes to UTF-8 text. Never fails; a UTF-8 BOM wins.
pub fn decode_text(bytes: &[u8]) -> String {
    let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    decoded.into_owned()
}

// ============================================================================
// CSV EXPORT PARSER
// ============================================================================

/// The bank's 13-column semicolon export.
pub struct CsvExportParser {
    home_currency: String,
}

struct RowRejection {
    reason: SkipReason,
    detail: String,
}

struct ParsedRow {
    transaction: BankTransaction,
    value_date_error: Option<ParseError>,
}

impl CsvExportParser {
    pub fn new(home_currency: &str) -> Self {
        CsvExportParser {
            home_currency: home_currency.to_string(),
        }
    }

    fn parse_record(
        &self,
        record: &StringRecord,
        line: usize,
        imported_at: DateTime<Utc>,
    ) -> Result<ParsedRow, RowRejection> {
        if record.len() < MIN_FIELDS {
            return Err(RowRejection {
                reason: SkipReason::TooFewFields,
                detail: format!("{} fields, need {}", record.len(), MIN_FIELDS),
            });
        }

        let field = |idx: usize| record.get(idx).unwrap_or("");

        let booking_date = parse_date(field(COL_BOOKING_DATE)).map_err(|e| RowRejection {
            reason: SkipReason::InvalidBookingDate,
            detail: e.to_string(),
        })?;

        let amount = parse_amount(field(COL_AMOUNT)).map_err(|e| RowRejection {
            reason: SkipReason::InvalidAmount,
            detail: e.to_string(),
        })?;

        let (value_date, value_date_error) = match parse_date(field(COL_VALUE_DATE)) {
            Ok(d) => (d, None),
            Err(e) => (booking_date, Some(e)),
        };

        let currency = match field(COL_CURRENCY).trim() {
            "" => self.home_currency.clone(),
            c => c.to_string(),
        };

        let transaction = BankTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            booking_date,
            value_date,
            payer_name: optional_text(field(COL_PAYER_NAME)),
            payer_account: optional_text(field(COL_PAYER_ACCOUNT)),
            description: optional_text(field(COL_DESCRIPTION)),
            amount,
            currency,
            imported_at,
            line_number: line,
            occurrence: 0,
        };

        Ok(ParsedRow {
            transaction,
            value_date_error,
        })
    }
}

impl Default for CsvExportParser {
    fn default() -> Self {
        Self::new("EUR")
    }
}

impl BankParser for CsvExportParser {
    fn parse_bytes(&self, bytes: &[u8]) -> Result<DecodedStatement, ImportError> {
        let text = decode_text(bytes);

        let mut reader = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        if reader.headers()?.is_empty() {
            return Err(ImportError::MissingHeader);
        }

        let imported_at = Utc::now();
        let mut quality = ImportQuality::default();
        let mut transactions = Vec::new();

        for result in reader.records() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
                    debug!(line, error = %e, "skipping unreadable row");
                    quality.record_skip(line, SkipReason::UnreadableRow, e.to_string());
                    continue;
                }
            };

            let line = record.position().map(|p| p.line() as usize).unwrap_or(0);

            match self.parse_record(&record, line, imported_at) {
                Ok(row) => {
                    if let Some(e) = row.value_date_error {
                        quality.record_value_date_fallback(line, e.to_string());
                    }
                    quality.record_accepted();
                    transactions.push(row.transaction);
                }
                Err(rejection) => {
                    debug!(line, reason = rejection.reason.as_str(), detail = %rejection.detail, "skipping row");
                    quality.record_skip(line, rejection.reason, rejection.detail);
                }
            }
        }

        number_identical_rows(&mut transactions);

        // Oldest first: settlement depends on this order
        transactions.sort_by_key(|tx| tx.booking_date);

        info!(
            accepted = quality.rows_accepted,
            skipped = quality.skipped_total(),
            "decoded statement"
        );

        Ok(DecodedStatement {
            transactions,
            quality,
        })
    }
}

/// Give each row its position among identical rows of this statement, in file order.
///
/// A parent paying twice on the same day with the same reference is two
/// payments; re-importing the same export still yields the same hashes.
fn number_identical_rows(transactions: &mut [BankTransaction]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for tx in transactions.iter_mut() {
        let count = seen.entry(tx.content_key()).or_insert(0);
        tx.occurrence = *count;
        *count += 1;
    }
}

/// Trimmed text, or `None` when nothing is left.
fn optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
