//! Parser for the trustee's DIF-family valuation workbooks.
//!
//! The "Portfolio Val." sheet is a semi-structured grid: Roman-numeral
//! section headings (Cash, Debt Securities, Equities, ...), a bilingual
//! two-line column header per section, optional accounting-treatment
//! sub-blocks, holding rows and a "Total" trailer. This crate recovers
//! normalized holding records from that grid and cross-validates them
//! against the trustee's own "Portfolio Sum." sheet before anything reaches
//! downstream reconciliation.

pub mod error;
pub mod grid;
pub mod header;
pub mod portfolio;
pub mod record;
pub mod section;
pub mod summary;

use anyhow::{Context, Result};
use calamine::{open_workbook, Reader, Xls};
use serde_json::Value;
use std::path::Path;

pub use crate::error::ParseError;
pub use crate::grid::{range_to_lines, Line};
pub use crate::portfolio::PortfolioInfo;
pub use crate::summary::{read_summary, validate, PortfolioSummary};

pub const HOLDINGS_SHEET: &str = "Portfolio Val.";
pub const SUMMARY_SHEET: &str = "Portfolio Sum.";

/// Document family a workbook belongs to. Layout differences between the DIF
/// fund and the Macau funds are configuration on one parser, not parallel
/// parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Dif,
    Macau,
}

#[derive(Debug, Clone, Copy)]
pub struct ParseConfig {
    pub document_type: DocumentType,
    /// Whether futures valuation adds the FX gain/loss column on top of the
    /// market gain/loss during cross-validation. Matches the trustee's later
    /// summary sheets but is not confirmed for every document variant; see
    /// DESIGN.md.
    pub futures_fx_adjustment: bool,
}

impl ParseConfig {
    /// Derive the configuration from a resolved portfolio id (Macau fund ids
    /// start with "3").
    pub fn for_portfolio(portfolio: &str) -> Self {
        let document_type = if portfolio.starts_with('3') {
            DocumentType::Macau
        } else {
            DocumentType::Dif
        };
        ParseConfig {
            document_type,
            futures_fx_adjustment: true,
        }
    }
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            document_type: DocumentType::Dif,
            futures_fx_adjustment: true,
        }
    }
}

/// Parse the valuation grid into enriched holding records.
///
/// Section 0 of the grid supplies the document-wide fields (valuation date,
/// portfolio, custodian) merged into every record; the remaining sections
/// each yield their holding rows.
pub fn read_holdings(lines: Vec<Line>) -> Result<Vec<Value>, ParseError> {
    let sections = section::lines_to_sections(lines);
    let info = portfolio::read_portfolio_info(&sections[0])?;

    let mut records = Vec::new();
    for section_lines in &sections[1..] {
        records.extend(record::section_to_records(section_lines)?);
    }

    for rec in &mut records {
        if let Some(obj) = rec.as_object_mut() {
            obj.insert(
                "portfolio".to_string(),
                Value::String(info.portfolio.to_string()),
            );
            obj.insert(
                "valuation_date".to_string(),
                Value::String(info.valuation_date.clone()),
            );
            obj.insert(
                "custodian".to_string(),
                Value::String(info.custodian.to_string()),
            );
        }
    }
    Ok(records)
}

/// Open a trustee workbook and read the holdings from "Portfolio Val.".
pub fn read_holdings_file<P: AsRef<Path>>(path: P) -> Result<Vec<Value>> {
    let lines = sheet_lines(path.as_ref(), HOLDINGS_SHEET)?;
    read_holdings(lines)
        .with_context(|| format!("Cannot parse holdings in {}", path.as_ref().display()))
}

/// Read the "Portfolio Sum." sheet of a trustee workbook.
pub fn read_summary_file<P: AsRef<Path>>(path: P) -> Result<PortfolioSummary> {
    let lines = sheet_lines(path.as_ref(), SUMMARY_SHEET)?;
    summary::read_summary(&lines)
        .with_context(|| format!("Cannot parse summary in {}", path.as_ref().display()))
}

fn sheet_lines(path: &Path, sheet: &str) -> Result<Vec<Line>> {
    let mut workbook: Xls<_> =
        open_workbook(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let range = workbook
        .worksheet_range(sheet)
        .with_context(|| format!("Cannot read sheet '{}' in {}", sheet, path.display()))?;
    Ok(range_to_lines(&range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::Data;
    use std::collections::BTreeMap;

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    fn n(value: f64) -> Data {
        Data::Float(value)
    }

    fn e() -> Data {
        Data::Empty
    }

    /// A cut-down but structurally complete "Portfolio Val." sheet for the
    /// DIF fund: document header, cash, bonds (HTM and trading sub-blocks,
    /// plus a matured zero row), equities and futures.
    fn valuation_lines() -> Vec<Line> {
        let mut lines = vec![
            vec![s("China Life Trustees Limited")],
            vec![
                s("Fund Name 基金名稱 :"),
                s("China Life Franklin Global - Diversified Income Fund"),
            ],
            vec![s("Valuation Period 估值期間 :"), n(43220.0), n(28.0), n(43248.0)],
            vec![s(""), e(), s("")],
        ];

        // I. Cash
        lines.extend(vec![
            vec![s("I. Cash - USD 現金")],
            vec![s("項目"), s("戶口號碼"), s("FX"), s("成本價"), s("市價"), s("%")],
            vec![s("Description"), s("Account No."), s("for TXN"), s("Book Cost"), s("M. Value"), s("(Fund)")],
            vec![
                s("Bank of China (Hong Kong) - Current Account"),
                s("012-875-123456"),
                n(7.8493),
                n(2500000.0),
                n(2500000.0),
                n(2.5),
            ],
            vec![s("Total (總額)"), e(), e(), n(2500000.0)],
        ]);

        // II. Debt Securities
        lines.extend(vec![
            vec![s("II. Debt Securities 債務證券 - USD")],
            vec![
                s("項目"), s("票面值"), s("幣值"), s("上市 (是/否)"), s("Primary"),
                s("(AVG) FX"), s("Int."), s("Int."), s("到期日"), s("Cost"),
                s("Price"), s("(Amortized)"), s("成本價"), s("Int."), s("市價"),
                s("Adjusted Value"), s("應收利息"), s("Year-End"), s("Gain/(Loss)"),
                s("FX"), s("%"), s("Yield"),
            ],
            vec![
                s("Description"), s("Par Amt"), s("CCY"), s("Listed (Y/N)"), s("Exchange"),
                s("for TXN"), s("Rate (%)"), s("Start Day"), s("Maturity"), s("(%)"),
                s("(%)"), s("(%)"), s("Book Cost"), s("Bought"), s("M. Value"),
                s("(Amortized)"), s("Accr. Int."), s("Amortization"), s("M. Value"),
                s("HKD Equiv."), s("(Fund)"), s("%"),
            ],
            vec![s("(i) Held to Maturity (Amortized Cost) 持至到期")],
            vec![
                s("(USY9896RAB79) Zoomlion HK SPV Co Ltd 6.125%"),
                n(13700000.0), s("USD"), s("Y"), s("HK"), e(),
                n(0.06125), n(43089.0), n(44915.0), n(96.4166058),
                e(), n(97.2761909), n(13209075.0), e(), e(),
                e(), e(), e(), e(), e(), n(13.3), e(),
            ],
            vec![
                s("(XS1234567890) CNOOC Finance 3.5%"),
                n(5000000.0), s("USD"), s("Y"), s("HK"), e(),
                n(0.035), n(42986.0), n(44733.0), n(99.8),
                e(), n(100.0), n(4990000.0), e(), e(),
                e(), n(50000.0), e(), e(), e(), n(5.0), e(),
            ],
            vec![
                s("(US912828U816) US Treasury 2.0%"),
                n(2000000.0), s("USD"), s("Y"), s("US"), e(),
                n(0.02), n(42689.0), n(44519.0), n(99.1),
                e(), n(99.5), n(1982000.0), e(), e(),
                e(), n(20000.0), e(), e(), e(), n(2.0), e(),
            ],
            vec![
                s("(X5943) CLP Power 4.25%"),
                n(1000000.0), s("USD"), s("N"), e(), e(),
                n(0.0425), n(42826.0), n(44652.0), n(100.9),
                e(), n(101.2), n(1009000.0), e(), e(),
                e(), e(), e(), e(), e(), n(1.0), e(),
            ],
            vec![
                s("(XS0000000000) Matured note"),
                n(0.0), s("USD"), s("Y"), s("HK"), e(),
                n(0.05), n(41000.0), n(42500.0), n(100.0),
                e(), n(100.0), n(0.0), e(), e(),
                e(), e(), e(), e(), e(), n(0.0), e(),
            ],
            vec![s("(ii) Trading 買賣")],
            vec![
                s("(US02343UAC45) Alibaba 4.5%"),
                n(3000000.0), s("USD"), s("Y"), s("US"), e(),
                n(0.045), n(43070.0), n(44896.0), n(98.5),
                n(98.0), e(), n(2955000.0), e(), n(2940000.0),
                e(), n(30000.0), e(), e(), e(), n(3.0), e(),
            ],
            vec![s("Total (總額)"), e(), e(), e(), e(), e(), e(), e(), e(), e(), e(), e(), n(24145075.0)],
        ]);

        // III. Equities
        lines.extend(vec![
            vec![s("III. Equities 股票 - HK$")],
            vec![
                s("項目"), s("股數"), s("上市 (是/否)"), s("Location"), s("最後交易日"),
                s("Avg."), s("Market"), s("成本價"), s("市價"), s("Gain/(Loss)"),
                s("FX"), s("%"),
            ],
            vec![
                s("Description"), s("Share"), s("Listed (Y/N)"), s("of Listed"), s("Latest V.D."),
                s("Price"), s("Price"), s("Book Cost"), s("M. Value"), s("M. Value"),
                s("HKD Equiv."), s("(Fund)"),
            ],
            vec![
                s("(H0939) China Construction Bank"),
                n(500000.0), s("Y"), s("HK"), n(43248.0),
                n(6.5), n(7.0), n(3250000.0), n(3500000.0), n(250000.0),
                e(), n(3.5),
            ],
            vec![
                s("(N0005) HSBC Holdings"),
                n(100000.0), s("Y"), s("HK"), n(43248.0),
                n(70.0), n(75.0), n(7000000.0), n(7500000.0), n(500000.0),
                e(), n(7.5),
            ],
            vec![s("Total (總額)"), e(), e(), e(), e(), e(), e(), n(10250000.0), n(11000000.0)],
        ]);

        // IV. Futures
        lines.extend(vec![
            vec![s("IV. Futures 期貨")],
            vec![s("項目"), s("合約數量"), s(""), s(""), s("到期日"), s("Gain/(Loss)"), s("%")],
            vec![s("Description"), s("No. of Contracts"), s("Long/ Short"), s("Trade Date"), s("Maturity"), s("M. Value"), s("(Fund)")],
            vec![s("HSI Futures"), n(2.0), s("Long"), n(43240.0), s("JUN18"), n(-52468.5), n(0.0)],
            vec![s("Total (總額)"), e(), e(), e(), e(), n(-52468.5)],
        ]);

        lines
    }

    /// The matching "Portfolio Sum." sheet. Subtotals equal the bottom-up
    /// sums of `valuation_lines()`.
    fn summary_lines() -> Vec<Line> {
        vec![
            vec![s("China Life Franklin Global - Diversified Income Fund")],
            vec![s(""), s("Last Period"), s(""), s("Current Portfolio"), s("")],
            vec![s("現金 Cash"), n(2400000.0), n(2.4), n(2500000.0), n(2.5)],
            vec![s("債務證券 Debt Securities"), n(20000000.0), n(20.0), n(20368838.1533), n(20.4)],
            vec![s("債券攤銷 Debt Amortization"), n(3900000.0), n(3.9), n(4000000.0), n(4.0)],
            vec![s("股票 Equities"), n(10000000.0), n(10.0), n(11000000.0), n(11.0)],
            vec![s("期貨 Futures"), n(0.0), n(0.0), n(-52468.5), n(0.0)],
            vec![s("Total Units Held 持有單位總數"), n(3400000.0), n(0.0), n(3500000.0)],
            vec![s("Unit Price 單位價格"), n(10.5), n(0.0), n(10.8047)],
            vec![s("Net Asset Value 資產淨值"), n(36000000.0), n(0.0), n(37816369.6533)],
        ]
    }

    fn filter<'a>(records: &'a [Value], pred: impl Fn(&Value) -> bool + 'a) -> Vec<&'a Value> {
        records.iter().filter(|r| pred(r)).collect()
    }

    #[test]
    fn test_read_holdings_end_to_end() {
        let records = read_holdings(valuation_lines()).unwrap();
        // 1 cash + 4 HTM bonds + 1 trading bond + 2 equities + 1 futures;
        // the matured zero row is dropped
        assert_eq!(records.len(), 9);

        for rec in &records {
            assert_eq!(rec["portfolio"], "19437");
            assert_eq!(rec["custodian"], "BOCHK");
            assert_eq!(rec["valuation_date"], "2018-5-28");
            assert!(!rec["type"].as_str().unwrap().is_empty());
        }

        let htm = filter(&records, |r| r["type"] == "bond" && r["accounting"] == "htm");
        assert_eq!(htm.len(), 4);
        let zoomlion = htm[0];
        assert_eq!(zoomlion["isin"], "USY9896RAB79");
        assert_eq!(zoomlion["quantity"], 13700000.0);
        assert_eq!(zoomlion["coupon_rate"], 0.06125);
        assert_eq!(zoomlion["coupon_start_date"], "2017-12-20");
        assert_eq!(zoomlion["maturity_date"], "2022-12-20");
        assert_eq!(zoomlion["currency"], "USD");
        // Short bond codes are stored as ISINs too
        assert_eq!(htm[3]["isin"], "X5943");

        let trading = filter(&records, |r| r["type"] == "bond" && r["accounting"] == "trading");
        assert_eq!(trading.len(), 1);
        assert_eq!(trading[0]["isin"], "US02343UAC45");

        let equities = filter(&records, |r| r["type"] == "equity");
        assert_eq!(equities.len(), 2);
        assert_eq!(equities[0]["ticker"], "939 HK");
        assert_eq!(equities[1]["ticker"], "5 HK");
        assert_eq!(equities[0]["currency"], "HKD");
        assert_eq!(equities[0]["last_trade_date"], "2018-5-28");

        let futures = filter(&records, |r| r["type"] == "futures");
        assert_eq!(futures.len(), 1);
        assert_eq!(futures[0]["market_gain_loss"], -52468.5);
        // Futures maturities keep the source format
        assert_eq!(futures[0]["maturity_date"], "JUN18");
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let first = read_holdings(valuation_lines()).unwrap();
        let second = read_holdings(valuation_lines()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_records_reconcile_with_summary() {
        let records = read_holdings(valuation_lines()).unwrap();
        let summary = summary::read_summary(&summary_lines()).unwrap();

        let config = ParseConfig::for_portfolio("19437");
        assert_eq!(config.document_type, DocumentType::Dif);
        validate(&records, &summary, &config).unwrap();
    }

    #[test]
    fn test_validation_catches_perturbed_summary() {
        let records = read_holdings(valuation_lines()).unwrap();
        let mut summary = summary::read_summary(&summary_lines()).unwrap();
        summary.totals.insert("equity".to_string(), 11000010.0);

        assert!(matches!(
            validate(&records, &summary, &ParseConfig::default()),
            Err(ParseError::InconsistentRecordSum { .. })
        ));
    }

    #[test]
    fn test_validation_catches_perturbed_unit_price() {
        let records = read_holdings(valuation_lines()).unwrap();
        let mut summary = summary::read_summary(&summary_lines()).unwrap();
        summary.unit_price = 10.9;

        assert!(matches!(
            validate(&records, &summary, &ParseConfig::default()),
            Err(ParseError::InconsistentNav { .. })
        ));
    }

    #[test]
    fn test_summary_totals_stay_off_records() {
        let records = read_holdings(valuation_lines()).unwrap();
        let mut totals = BTreeMap::new();
        totals.insert("cash".to_string(), 2500000.0);
        let _summary = PortfolioSummary {
            totals,
            nav: 0.0,
            units: 0.0,
            unit_price: 0.0,
        };
        // Only portfolio, valuation_date and custodian are document-wide
        for rec in &records {
            assert!(rec.get("nav").is_none());
            assert!(rec.get("unit_price").is_none());
        }
    }
}
