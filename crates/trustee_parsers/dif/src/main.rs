use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::env;

use dif::ParseConfig;

fn main() -> Result<()> {
    // Usage:
    //   dif_parser <workbook.xls> [output.csv]
    //
    // Parses the trustee valuation workbook, cross-checks the holdings
    // against the workbook's own summary page and writes the records as csv.

    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(workbook_path) = args.get(1) else {
        println!("Usage: dif_parser <workbook.xls> [output.csv]");
        return Ok(());
    };
    let output_path = args.get(2).map(|s| s.as_str()).unwrap_or("holdings.csv");

    println!("📖 Parsing {}", workbook_path);
    let records = dif::read_holdings_file(workbook_path)?;
    if records.is_empty() {
        println!("❌ No holdings found.");
        return Ok(());
    }

    let portfolio = records[0]
        .get("portfolio")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("records carry no portfolio id"))?;
    let config = ParseConfig::for_portfolio(portfolio);

    let summary = dif::read_summary_file(workbook_path)?;
    dif::validate(&records, &summary, &config)
        .with_context(|| format!("{} does not reconcile with its summary page", workbook_path))?;

    let rows = utils::records_to_rows(&records, Some(&union_headers(&records)));
    utils::write_delimited(output_path, &rows, b',')?;

    println!("\n📊 Summary:");
    println!("─────────────────────────────────────────");
    println!("✓ Portfolio {} as of {}", portfolio, valuation_date(&records));
    println!("✓ {} holdings reconciled against the summary page", records.len());
    println!("✓ Written to {}", output_path);
    Ok(())
}

/// Every field appearing on any record, in first-seen order. Sections carry
/// different column sets, so the union keeps sparse columns visible.
fn union_headers(records: &[Value]) -> Vec<&str> {
    let mut headers: Vec<&str> = Vec::new();
    for record in records {
        if let Some(obj) = record.as_object() {
            for key in obj.keys() {
                if !headers.contains(&key.as_str()) {
                    headers.push(key);
                }
            }
        }
    }
    headers
}

fn valuation_date(records: &[Value]) -> &str {
    records[0]
        .get("valuation_date")
        .and_then(Value::as_str)
        .unwrap_or("?")
}
