use crate::error::ParseError;
use crate::grid::{cell_str, nth_numeric, Line};
use crate::{DocumentType, ParseConfig};
use serde_json::Value;
use std::collections::BTreeMap;

/// Absolute tolerance, in currency units, between a summary subtotal and the
/// bottom-up record sum for the same category.
const SUM_TOLERANCE: f64 = 0.2;
const NAV_TOLERANCE: f64 = 1e-4;

/// Subtotals from the "Portfolio Sum." sheet, produced independently by the
/// trustee's own system. Used only for cross-validation, never merged into
/// records.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    /// Subtotal per record type tag ("cash", "bond", "equity", "futures",
    /// "fixed deposit cash"). Bond amortization is already folded into
    /// "bond".
    pub totals: BTreeMap<String, f64>,
    pub nav: f64,
    pub units: f64,
    pub unit_price: f64,
}

/// Category of one summary row, from its bilingual label.
fn row_category(label: &str) -> Option<&'static str> {
    // "Debt Amortization" before "Debt Securities", and the deposit/futures
    // labels before the bare "Cash" keyword.
    if label.contains("Debt Amortization") || label.contains("債券攤銷") {
        Some("bond amortization")
    } else if label.contains("Debt Securities") || label.contains("債務證券") {
        Some("bond")
    } else if label.contains("Fixed Deposit") || label.contains("定期存款") {
        Some("fixed deposit cash")
    } else if label.contains("Equities") || label.contains("股票") {
        Some("equity")
    } else if label.contains("Futures") || label.contains("期貨") {
        Some("futures")
    } else if label.contains("Cash") || label.contains("現金") {
        Some("cash")
    } else {
        None
    }
}

/// Read the summary sheet: per-category subtotals plus the NAV figures.
///
/// The "Current Portfolio" column-header row anchors the subtotal block;
/// each category row carries last-period amount, last-period percentage and
/// the current amount, so the figure wanted is the third numeric cell.
pub fn read_summary(lines: &[Line]) -> Result<PortfolioSummary, ParseError> {
    let anchor = lines
        .iter()
        .position(|line| {
            line.iter()
                .any(|cell| cell_str(Some(cell)).starts_with("Current Portfolio"))
        })
        .ok_or(ParseError::SummaryAnchorNotFound)?;

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    let mut bond_amortization = 0.0;
    for line in &lines[anchor + 1..] {
        let label = cell_str(line.first());
        let Some(category) = row_category(&label) else {
            continue;
        };
        let Some(amount) = nth_numeric(line, 3) else {
            continue;
        };
        if category == "bond amortization" {
            bond_amortization += amount;
        } else {
            *totals.entry(category.to_string()).or_insert(0.0) += amount;
        }
    }
    if bond_amortization != 0.0 {
        *totals.entry("bond".to_string()).or_insert(0.0) += bond_amortization;
    }

    let units = find_figure(lines, "Total Units Held");
    let unit_price = find_figure(lines, "Unit Price");
    let nav = find_figure(lines, "Net Asset Value")
        .unwrap_or_else(|| totals.values().sum());

    Ok(PortfolioSummary {
        totals,
        nav,
        units: units.unwrap_or(0.0),
        unit_price: unit_price.unwrap_or(0.0),
    })
}

fn find_figure(lines: &[Line], prefix: &str) -> Option<f64> {
    lines
        .iter()
        .find(|line| cell_str(line.first()).starts_with(prefix))
        .and_then(|line| nth_numeric(line, 3))
}

/// Cross-check bottom-up record totals against the trustee's own summary.
///
/// The summary sheet is produced independently, so agreement here is the
/// pipeline's core correctness check: a wrong column or a silently skipped
/// row surfaces as a reconciliation failure instead of propagating into the
/// downstream files.
pub fn validate(
    records: &[Value],
    summary: &PortfolioSummary,
    config: &ParseConfig,
) -> Result<(), ParseError> {
    for (category, expected) in &summary.totals {
        let matching: Vec<&Value> = records
            .iter()
            .filter(|r| record_category(r) == Some(category.as_str()))
            .collect();
        if matching.is_empty() {
            continue;
        }

        let computed: f64 = matching
            .iter()
            .map(|r| exchange_rate(r) * record_value(r, config))
            .sum();
        if (computed - expected).abs() > SUM_TOLERANCE {
            log::error!(
                "{} records sum to {}, summary says {}",
                category,
                computed,
                expected
            );
            return Err(ParseError::InconsistentRecordSum {
                category: category.clone(),
                expected: *expected,
                computed,
            });
        }
    }

    if summary.units > 0.0 {
        let nav_per_unit = summary.nav / summary.units;
        if (nav_per_unit - summary.unit_price).abs() > NAV_TOLERANCE {
            return Err(ParseError::InconsistentNav {
                unit_price: summary.unit_price,
                nav_per_unit,
            });
        }
    }
    Ok(())
}

/// Summary category a record counts towards. Broker account cash rolls into
/// the cash subtotal; forwards have no summary row at all.
fn record_category(record: &Value) -> Option<&'static str> {
    match record.get("type").and_then(Value::as_str)? {
        "cash" | "broker account cash" => Some("cash"),
        "fixed deposit cash" => Some("fixed deposit cash"),
        "bond" => Some("bond"),
        "equity" => Some("equity"),
        "futures" => Some("futures"),
        _ => None,
    }
}

fn field_f64(record: &Value, field: &str) -> f64 {
    record.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

fn exchange_rate(record: &Value) -> f64 {
    record
        .get("exchange_rate")
        .and_then(Value::as_f64)
        .unwrap_or(1.0)
}

/// Per-category valuation of one record, in the section's own currency.
fn record_value(record: &Value, config: &ParseConfig) -> f64 {
    match record.get("type").and_then(Value::as_str).unwrap_or("") {
        "cash" | "broker account cash" | "fixed deposit cash" => field_f64(record, "book_cost"),
        "bond" => {
            let accrued = field_f64(record, "accrued_interest");
            let per_par = if record.get("accounting").and_then(Value::as_str) == Some("htm") {
                field_f64(record, "amortized_cost")
            } else {
                field_f64(record, "price")
            };
            field_f64(record, "quantity") / 100.0 * per_par + accrued
        }
        "equity" => field_f64(record, "market_value"),
        "futures" => {
            let mut value = field_f64(record, "market_gain_loss");
            if config.futures_fx_adjustment {
                value += field_f64(record, fx_field(config.document_type));
            }
            value
        }
        _ => 0.0,
    }
}

fn fx_field(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Dif => "fx_gain_loss_hkd",
        DocumentType::Macau => "fx_gain_loss_mop",
    }
}
