use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::{env, path::Path};

use dif::ParseConfig;

fn main() -> Result<()> {
    // Usage:
    //   geneva_recon <workbook.xls> [output_dir]
    //
    // Parses a trustee valuation workbook, cross-checks it against its own
    // summary page and writes the three Geneva reconciliation files into
    // output_dir (default: current directory).

    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(workbook_path) = args.get(1) else {
        println!("Usage: geneva_recon <workbook.xls> [output_dir]");
        return Ok(());
    };
    let output_dir = args.get(2).map(|s| s.as_str()).unwrap_or(".");

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
    let summary = dif::read_summary_file(workbook_path)?;
    dif::validate(&records, &summary, &ParseConfig::for_portfolio(portfolio))
        .with_context(|| format!("{} does not reconcile with its summary page", workbook_path))?;

    let out = Path::new(output_dir);
    geneva::write_cash_csv(out.join("geneva cash.csv"), &records)?;
    geneva::write_afs_csv(out.join("geneva afs.csv"), &records)?;
    geneva::write_htm_csv(out.join("geneva htm.csv"), &records)?;

    println!("\n📊 Summary:");
    println!("─────────────────────────────────────────");
    println!("✓ Portfolio {} reconciled against the summary page", portfolio);
    println!("✓ {} cash rows", geneva::cash_records(&records).len());
    println!("✓ {} mark-to-market rows", geneva::afs_records(&records).len());
    println!("✓ {} held-to-maturity rows", geneva::htm_records(&records).len());
    println!("✓ Written to {}", out.display());
    Ok(())
}
