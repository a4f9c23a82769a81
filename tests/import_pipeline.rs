// End-to-end: raw export bytes → decoded transactions → fee settlement → SQLite

use chrono::NaiveDate;
use fee_reconcile::{
    get_all_transactions, get_events_for_run, get_payment_matches_for_transaction, run_import,
    run_import_into, setup_database, verify_count, AppConfig, Child, FeeObligation, MatchBasis,
    Money, Parent, Roster, UnresolvedReason,
};
use rusqlite::Connection;

const HEADER: &str = "Auftragskonto;Buchungstag;Valutadatum;Buchungstext;Verwendungszweck;Glaeubiger ID;Mandatsreferenz;Beguenstigter/Zahlungspflichtiger;Kontonummer/IBAN;BIC (SWIFT-Code);Betrag;Waehrung;Info";

fn row(booking: &str, purpose: &str, payer: &str, amount: &str) -> String {
    format!(
        "DE001;{};{};GUTSCHRIFT;{};;;{};DE02;BIC;{};EUR;Umsatz gebucht",
        booking, booking, purpose, payer, amount
    )
}

/// Encode as the bank does: one byte per character (Windows-1252 / Latin-1 range).
fn latin1(text: &str) -> Vec<u8> {
    text.chars().map(|c| c as u32 as u8).collect()
}

fn statement(rows: &[String]) -> Vec<u8> {
    let mut text = String::from(HEADER);
    for r in rows {
        text.push('\n');
        text.push_str(r);
    }
    text.push('\n');
    latin1(&text)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn fee(id: &str, child: &str, month: u32, cents: i64) -> FeeObligation {
    FeeObligation::new(id, child, date(2024, month, 1), Money::from_minor(cents))
}

fn roster() -> Roster {
    Roster::new(vec![
        Child::new("lisa", "Lisa", "Müller", "10001")
            .with_parent(Parent::new("Maria", "Müller")),
        Child::new("tom", "Tom", "Becker", "10002")
            .with_parent(Parent::new("Jörg", "Weiß")),
    ])
}

#[test]
fn oldest_obligation_is_settled_first_regardless_of_file_order() {
    // Newer booking first in the file
    let bytes = statement(&[
        row("05.05.2024", "Müller Lisa Mai", "Maria Müller", "100,00"),
        row("03.04.2024", "Müller Lisa April", "Maria Müller", "100,00"),
    ]);
    let fees = vec![fee("may", "lisa", 5, 10000), fee("apr", "lisa", 4, 10000)];

    let outcome = run_import(&bytes, &roster(), fees, &AppConfig::default()).unwrap();

    assert_eq!(outcome.transactions[0].booking_date, date(2024, 4, 3));
    let april_tx = &outcome.transactions[0].id;
    let may_tx = &outcome.transactions[1].id;

    let report = &outcome.report;
    assert_eq!(report.matches.len(), 2);
    assert_eq!(&report.matches[0].transaction_id, april_tx);
    assert_eq!(report.matches[0].obligation_id, "apr");
    assert_eq!(&report.matches[1].transaction_id, may_tx);
    assert_eq!(report.matches[1].obligation_id, "may");
    assert!(report.obligations.iter().all(|o| o.settled));
}

#[test]
fn umlaut_reference_matches_digraph_roster_name() {
    let bytes = statement(&[row("03.05.2024", "Mueller Lisa Beitrag Mai", "", "120,00")]);
    let fees = vec![fee("may", "lisa", 5, 12000)];

    let outcome = run_import(&bytes, &roster(), fees, &AppConfig::default()).unwrap();

    let m = &outcome.report.matches[0];
    assert_eq!(m.child_id, "lisa");
    assert_eq!(m.basis, MatchBasis::DirectName);
    assert!((m.confidence - 0.85).abs() < f64::EPSILON);
}

#[test]
fn unrelated_child_with_same_first_name_is_not_matched() {
    let roster = Roster::new(vec![Child::new("other", "Lisa", "Schmidt", "")]);
    let bytes = statement(&[row("03.05.2024", "Mueller Lisa Beitrag Mai", "", "120,00")]);
    let fees = vec![fee("may", "other", 5, 12000)];

    let outcome = run_import(&bytes, &roster, fees, &AppConfig::default()).unwrap();

    assert!(outcome.report.matches.is_empty());
    assert_eq!(outcome.report.unresolved_count(UnresolvedReason::NoPersonIdentified), 1);
}

#[test]
fn member_number_beats_payer_name_and_parent_name_is_used_as_fallback() {
    let bytes = statement(&[
        // Paid by Lisa's mother, but quoting Tom's member number
        row("02.05.2024", "Beitrag 10002", "Maria Müller", "50,00"),
        // Only the parent is named
        row("04.05.2024", "Vereinsbeitrag", "Jörg Weiß", "50,00"),
    ]);
    let fees = vec![
        fee("tom-apr", "tom", 4, 5000),
        fee("tom-may", "tom", 5, 5000),
        fee("lisa-may", "lisa", 5, 5000),
    ];

    let outcome = run_import(&bytes, &roster(), fees, &AppConfig::default()).unwrap();
    let report = &outcome.report;

    assert_eq!(report.matches.len(), 2);
    assert_eq!(report.matches[0].obligation_id, "tom-apr");
    assert_eq!(report.matches[0].basis, MatchBasis::Identifier);
    assert_eq!(report.matches[1].obligation_id, "tom-may");
    assert_eq!(report.matches[1].basis, MatchBasis::ParentName);
}

#[test]
fn bad_rows_are_audited_and_do_not_stop_the_import() {
    let mut rows = vec![row("03.05.2024", "Müller Lisa", "", "100,00")];
    rows.push(row("", "Müller Lisa", "", "100,00"));
    rows.push(row("03.05.2024", "Müller Lisa", "", ""));
    rows.push("DE001;03.05.2024;too;few".to_string());

    let outcome = run_import(
        &statement(&rows),
        &roster(),
        vec![fee("may", "lisa", 5, 10000)],
        &AppConfig::default(),
    )
    .unwrap();

    assert_eq!(outcome.transactions.len(), 1);
    assert_eq!(outcome.quality.rows_accepted, 1);
    assert_eq!(outcome.quality.skipped_total(), 3);
    assert_eq!(outcome.report.matches.len(), 1);
}

#[test]
fn reimporting_overlapping_export_stores_and_matches_only_new_rows() {
    let mut conn = Connection::open_in_memory().unwrap();
    let config = AppConfig::default();

    let april = row("03.04.2024", "Müller Lisa April", "", "100,00");
    let may = row("05.05.2024", "Müller Lisa Mai", "", "100,00");

    let first = run_import_into(
        &mut conn,
        &statement(&[april.clone()]),
        &roster(),
        vec![fee("apr", "lisa", 4, 10000)],
        &config,
    )
    .unwrap();
    assert_eq!(first.transactions.len(), 1);
    assert_eq!(first.report.matches.len(), 1);

    // The next export overlaps by the April row; the caller brings the May fee
    let mut fees = first.report.obligations.clone();
    fees.push(fee("may", "lisa", 5, 10000));
    let second = run_import_into(&mut conn, &statement(&[april, may]), &roster(), fees, &config).unwrap();

    assert_eq!(second.already_imported, 1);
    assert_eq!(second.transactions.len(), 1);
    assert_eq!(second.transactions[0].booking_date, date(2024, 5, 5));
    assert_eq!(second.report.transactions_processed, 1);
    assert_eq!(second.report.matches.len(), 1);
    assert_eq!(second.report.matches[0].obligation_id, "may");
    assert_eq!(second.report.matches[0].transaction_id, second.transactions[0].id);

    assert_eq!(verify_count(&conn).unwrap(), 2);
    let all = get_all_transactions(&conn).unwrap();
    assert_eq!(all[0].booking_date, date(2024, 4, 3));

    let april_matches = get_payment_matches_for_transaction(&conn, &first.transactions[0].id).unwrap();
    assert_eq!(april_matches.len(), 1);
    assert_eq!(april_matches[0].obligation_id, "apr");

    let events = get_events_for_run(&conn, second.run_id.as_deref().unwrap()).unwrap();
    assert_eq!(events[0].stats.duplicates, 1);
    assert_eq!(events[0].stats.inserted, 1);
}

#[test]
fn identical_payments_on_the_same_day_are_both_stored_and_settled() {
    let mut conn = Connection::open_in_memory().unwrap();
    let twice = row("03.05.2024", "Beitrag Lisa Mueller", "Maria Mueller", "100,00");
    let fees = vec![fee("apr", "lisa", 4, 10000), fee("may", "lisa", 5, 10000)];

    let outcome = run_import_into(
        &mut conn,
        &statement(&[twice.clone(), twice.clone()]),
        &roster(),
        fees,
        &AppConfig::default(),
    )
    .unwrap();

    assert_eq!(outcome.already_imported, 0);
    assert_eq!(outcome.transactions.len(), 2);
    assert_eq!(outcome.report.matches.len(), 2);
    assert!(outcome.report.obligations.iter().all(|o| o.settled));
    assert_eq!(verify_count(&conn).unwrap(), 2);

    // Same export again: nothing new
    let again = run_import_into(
        &mut conn,
        &statement(&[twice.clone(), twice]),
        &roster(),
        outcome.report.obligations.clone(),
        &AppConfig::default(),
    )
    .unwrap();
    assert_eq!(again.already_imported, 2);
    assert!(again.report.matches.is_empty());
    assert_eq!(verify_count(&conn).unwrap(), 2);
}

#[test]
fn failed_run_leaves_nothing_behind_and_can_be_retried() {
    let mut conn = Connection::open_in_memory().unwrap();
    setup_database(&conn).unwrap();
    conn.execute(
        "CREATE TRIGGER reject_matches BEFORE INSERT ON payment_matches
         BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        [],
    )
    .unwrap();

    let bytes = statement(&[row("03.05.2024", "Müller Lisa Mai", "", "100,00")]);
    let fees = || vec![fee("may", "lisa", 5, 10000)];

    let failed = run_import_into(&mut conn, &bytes, &roster(), fees(), &AppConfig::default());
    assert!(failed.is_err());
    assert_eq!(verify_count(&conn).unwrap(), 0);

    conn.execute("DROP TRIGGER reject_matches", []).unwrap();

    let retried = run_import_into(&mut conn, &bytes, &roster(), fees(), &AppConfig::default()).unwrap();
    assert_eq!(retried.already_imported, 0);
    assert_eq!(retried.report.matches.len(), 1);
    assert_eq!(verify_count(&conn).unwrap(), 1);
}
