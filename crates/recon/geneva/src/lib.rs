//! Turn holding records from the trustee valuation parser into the flat
//! files the Geneva reconciliation process loads: one cash file, one file of
//! mark-to-market positions (AFS/trading) and one file of held-to-maturity
//! bonds.

use serde_json::{Map, Value};
use std::path::Path;

pub const DELIMITER: u8 = b',';

pub const CASH_HEADERS: [&str; 9] = [
    "portfolio",
    "custodian",
    "date",
    "account_type",
    "account_num",
    "currency",
    "balance",
    "fx_rate",
    "local_currency_equivalent",
];

pub const AFS_HEADERS: [&str; 16] = [
    "portfolio",
    "date",
    "custodian",
    "ticker",
    "isin",
    "bloomberg_figi",
    "name",
    "currency",
    "accounting_treatment",
    "quantity",
    "average_cost",
    "price",
    "book_cost",
    "market_value",
    "market_gain_loss",
    "fx_gain_loss",
];

pub const HTM_HEADERS: [&str; 24] = [
    "portfolio",
    "date",
    "custodian",
    "geneva_investment_id",
    "isin",
    "bloomberg_figi",
    "name",
    "currency",
    "accounting_treatment",
    "par_amount",
    "is_listed",
    "listed_location",
    "fx_on_trade_day",
    "coupon_rate",
    "coupon_start_date",
    "maturity_date",
    "average_cost",
    "amortized_cost",
    "book_cost",
    "interest_bought",
    "amortized_value",
    "accrued_interest",
    "amortized_gain_loss",
    "fx_gain_loss",
];

fn field_str(record: &Value, field: &str) -> String {
    record
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn field_f64(record: &Value, field: &str) -> f64 {
    record.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

fn copy_field(out: &mut Map<String, Value>, record: &Value, field: &str) {
    out.insert(
        field.to_string(),
        record
            .get(field)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new())),
    );
}

/// Geneva reconciles FX gain/loss under one header regardless of the
/// reporting currency of the source document.
fn fx_gain_loss(record: &Value) -> Value {
    record
        .get("fx_gain_loss_hkd")
        .or_else(|| record.get("fx_gain_loss_mop"))
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()))
}

/// Cash rows for Geneva: bank cash plus futures broker account cash,
/// consolidated per custodian and currency.
///
/// Geneva keeps one cash bucket per currency, so multiple accounts in the
/// same currency collapse into a single row with the balances summed and the
/// account fields blanked (a merged row no longer describes one account).
pub fn cash_records(records: &[Value]) -> Vec<Value> {
    let is_cash = |r: &&Value| {
        matches!(
            r.get("type").and_then(Value::as_str),
            Some("cash") | Some("broker account cash")
        )
    };

    // (custodian, currency) -> merged row, in first-seen order
    let mut merged: Vec<((String, String), Map<String, Value>, usize)> = Vec::new();
    for record in records.iter().filter(is_cash) {
        let key = (
            field_str(record, "custodian"),
            field_str(record, "currency"),
        );
        let balance = field_f64(record, "book_cost");

        match merged.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, row, count)) => {
                let total = row.get("balance").and_then(Value::as_f64).unwrap_or(0.0) + balance;
                row.insert("balance".to_string(), Value::from(total));
                *count += 1;
            }
            None => {
                let mut row = Map::new();
                copy_field(&mut row, record, "portfolio");
                copy_field(&mut row, record, "custodian");
                row.insert(
                    "date".to_string(),
                    Value::String(field_str(record, "valuation_date")),
                );
                copy_field(&mut row, record, "account_type");
                row.insert(
                    "account_num".to_string(),
                    record
                        .get("account_number")
                        .cloned()
                        .unwrap_or_else(|| Value::String(String::new())),
                );
                copy_field(&mut row, record, "currency");
                row.insert("balance".to_string(), Value::from(balance));
                row.insert(
                    "fx_rate".to_string(),
                    Value::from(
                        record
                            .get("exchange_rate")
                            .and_then(Value::as_f64)
                            .unwrap_or(1.0),
                    ),
                );
                merged.push((key, row, 1));
            }
        }
    }

    merged
        .into_iter()
        .map(|(_, mut row, count)| {
            if count > 1 {
                row.insert("account_type".to_string(), Value::String(String::new()));
                row.insert("account_num".to_string(), Value::String(String::new()));
            }
            let balance = row.get("balance").and_then(Value::as_f64).unwrap_or(0.0);
            let fx_rate = row.get("fx_rate").and_then(Value::as_f64).unwrap_or(1.0);
            row.insert(
                "local_currency_equivalent".to_string(),
                Value::from(balance * fx_rate),
            );
            Value::Object(row)
        })
        .collect()
}

/// A position reconciled at market value: any equity, or a bond not held to
/// maturity.
fn is_afs_position(record: &Value) -> bool {
    match record.get("type").and_then(Value::as_str) {
        Some("equity") => true,
        Some("bond") => record.get("accounting").and_then(Value::as_str) != Some("htm"),
        _ => false,
    }
}

/// Mark-to-market rows (AFS and trading positions) for Geneva.
pub fn afs_records(records: &[Value]) -> Vec<Value> {
    records
        .iter()
        .filter(|r| is_afs_position(r))
        .map(|record| {
            let mut row = Map::new();
            for header in AFS_HEADERS {
                match header {
                    "date" => {
                        row.insert(
                            "date".to_string(),
                            Value::String(field_str(record, "valuation_date")),
                        );
                    }
                    "bloomberg_figi" => {
                        row.insert(header.to_string(), Value::String(String::new()));
                    }
                    "accounting_treatment" => {
                        row.insert(
                            header.to_string(),
                            Value::String(field_str(record, "accounting").to_uppercase()),
                        );
                    }
                    "name" => {
                        row.insert(
                            header.to_string(),
                            Value::String(field_str(record, "description")),
                        );
                    }
                    "fx_gain_loss" => {
                        row.insert(header.to_string(), fx_gain_loss(record));
                    }
                    _ => copy_field(&mut row, record, header),
                }
            }
            Value::Object(row)
        })
        .collect()
}

/// Held-to-maturity bond rows for Geneva. HTM positions live under a
/// dedicated investment id ("<isin> HTM") so that the same bond held in two
/// books never collides.
pub fn htm_records(records: &[Value]) -> Vec<Value> {
    let is_htm = |r: &&Value| {
        r.get("type").and_then(Value::as_str) == Some("bond")
            && r.get("accounting").and_then(Value::as_str) == Some("htm")
    };

    records
        .iter()
        .filter(is_htm)
        .map(|record| {
            let mut row = Map::new();
            for header in HTM_HEADERS {
                match header {
                    "date" => {
                        row.insert(
                            "date".to_string(),
                            Value::String(field_str(record, "valuation_date")),
                        );
                    }
                    "geneva_investment_id" => {
                        row.insert(
                            header.to_string(),
                            Value::String(format!("{} HTM", field_str(record, "isin"))),
                        );
                    }
                    "bloomberg_figi" => {
                        row.insert(header.to_string(), Value::String(String::new()));
                    }
                    "name" => {
                        row.insert(
                            header.to_string(),
                            Value::String(field_str(record, "description")),
                        );
                    }
                    "accounting_treatment" => {
                        row.insert(
                            header.to_string(),
                            Value::String(field_str(record, "accounting").to_uppercase()),
                        );
                    }
                    "par_amount" => {
                        row.insert(
                            header.to_string(),
                            record
                                .get("quantity")
                                .cloned()
                                .unwrap_or_else(|| Value::String(String::new())),
                        );
                    }
                    "fx_gain_loss" => {
                        row.insert(header.to_string(), fx_gain_loss(record));
                    }
                    _ => copy_field(&mut row, record, header),
                }
            }
            Value::Object(row)
        })
        .collect()
}

pub fn write_cash_csv<P: AsRef<Path>>(path: P, records: &[Value]) -> anyhow::Result<()> {
    let rows = utils::records_to_rows(&cash_records(records), Some(CASH_HEADERS.as_slice()));
    utils::write_delimited(path, &rows, DELIMITER)
}

pub fn write_afs_csv<P: AsRef<Path>>(path: P, records: &[Value]) -> anyhow::Result<()> {
    let rows = utils::records_to_rows(&afs_records(records), Some(AFS_HEADERS.as_slice()));
    utils::write_delimited(path, &rows, DELIMITER)
}

pub fn write_htm_csv<P: AsRef<Path>>(path: P, records: &[Value]) -> anyhow::Result<()> {
    let rows = utils::records_to_rows(&htm_records(records), Some(HTM_HEADERS.as_slice()));
    utils::write_delimited(path, &rows, DELIMITER)
}
