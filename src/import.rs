// 📥 Import Pipeline
// decode → sort → identify → settle, in one call
//
// `run_import` works purely in memory. `run_import_into` also stores the
// statement and reconciles only rows the database has not seen, all in
// one SQLite transaction.

use crate::config::AppConfig;
use crate::data_quality::ImportQuality;
use crate::db::{
    insert_event, insert_payment_matches, insert_transactions, setup_database, AuditEvent,
    ImportRunStats,
};
use crate::entities::{FeeObligation, Roster};
use crate::error::ImportError;
use crate::parser::{BankParser, CsvExportParser};
use crate::reconciliation::{ReconciliationEngine, ReconciliationReport};
use crate::transaction::BankTransaction;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// Everything one import run produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    /// Sorted by booking date; only newly stored rows for a database import
    pub transactions: Vec<BankTransaction>,
    pub quality: ImportQuality,
    pub report: ReconciliationReport,

    /// Rows skipped because an earlier import already stored them
    #[serde(default)]
    pub already_imported: usize,

    /// Audit trail key, set when the run was committed to a database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl ImportOutcome {
    pub fn stats(&self) -> ImportRunStats {
        ImportRunStats {
            rows_read: self.quality.rows_read,
            rows_skipped: self.quality.skipped_total(),
            inserted: self.transactions.len(),
            duplicates: self.already_imported,
            matches: self.report.matches.len(),
            unresolved: self.report.unresolved.len(),
            unapplied_credits: self.report.unapplied_credits.len(),
            pending: self.report.pending,
        }
    }
}

/// Decode a raw export and reconcile it against the roster and open fees.
///
/// Fails only when the stream itself is unusable; bad rows and unmatched
/// payments end up in the outcome.
pub fn run_import(
    bytes: &[u8],
    roster: &Roster,
    obligations: Vec<FeeObligation>,
    config: &AppConfig,
) -> Result<ImportOutcome, ImportError> {
    let decoded = CsvExportParser::new(&config.home_currency).parse_bytes(bytes)?;
    info!("{}", decoded.quality.summary());

    let engine = ReconciliationEngine::with_threshold(config.match_threshold);
    let report = engine.reconcile(&decoded.transactions, roster, obligations);

    Ok(ImportOutcome {
        transactions: decoded.transactions,
        quality: decoded.quality,
        report,
        already_imported: 0,
        run_id: None,
    })
}

/// Decode, store and reconcile against a SQLite database.
///
/// Rows already stored by an earlier run are neither stored nor reconciled
/// again. New rows, their matches and the audit entry are committed
/// together; on any error nothing of this run is kept.
pub fn run_import_into(
    conn: &mut Connection,
    bytes: &[u8],
    roster: &Roster,
    obligations: Vec<FeeObligation>,
    config: &AppConfig,
) -> anyhow::Result<ImportOutcome> {
    let decoded = CsvExportParser::new(&config.home_currency).parse_bytes(bytes)?;
    info!("{}", decoded.quality.summary());

    setup_database(conn)?;
    let db_tx = conn.transaction()?;

    let stored = insert_transactions(&db_tx, &decoded.transactions)?;
    if stored.duplicates > 0 {
        warn!("{} transactions were already imported and are skipped", stored.duplicates);
    }

    let fresh: HashSet<&str> = stored.inserted_ids.iter().map(String::as_str).collect();
    let new_transactions: Vec<BankTransaction> = decoded
        .transactions
        .iter()
        .filter(|tx| fresh.contains(tx.id.as_str()))
        .cloned()
        .collect();

    let engine = ReconciliationEngine::with_threshold(config.match_threshold);
    let report = engine.reconcile(&new_transactions, roster, obligations);
    insert_payment_matches(&db_tx, &report.matches)?;

    let run_id = uuid::Uuid::new_v4().to_string();
    let mut outcome = ImportOutcome {
        transactions: new_transactions,
        quality: decoded.quality,
        report,
        already_imported: stored.duplicates,
        run_id: None,
    };
    insert_event(&db_tx, &AuditEvent::statement_imported(&run_id, outcome.stats()))?;

    db_tx.commit()?;
    info!(run = %run_id, "import committed");

    outcome.run_id = Some(run_id);
    Ok(outcome)
}
