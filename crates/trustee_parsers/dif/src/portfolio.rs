use crate::error::ParseError;
use crate::grid::{cell_str, nth_numeric, Line};
use crate::record::{date_to_string, serial_to_date};

/// Document-wide fields read from the header section of the valuation sheet.
/// These are the only summary-page-independent fields merged into every
/// holding record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioInfo {
    /// "yyyy-m-d"
    pub valuation_date: String,
    pub portfolio: &'static str,
    pub custodian: &'static str,
}

/// Known fund names. Append-only: an unknown fund is fatal so that a new
/// fund shows up as a loud failure instead of a mislabeled file.
fn portfolio_id(fund_name: &str) -> Option<&'static str> {
    const PORTFOLIOS: [(&str, &str); 4] = [
        ("Diversified Income Fund", "19437"),
        ("Balanced Fund", "30004"),
        ("Guarantee Fund", "30005"),
        ("Growth Fund", "30006"),
    ];

    PORTFOLIOS
        .iter()
        .find(|(name, _)| fund_name.contains(name))
        .map(|(_, id)| *id)
}

fn custodian(portfolio: &str) -> Option<&'static str> {
    match portfolio {
        "19437" => Some("BOCHK"),
        "30004" | "30005" | "30006" => Some("BNU"),
        _ => None,
    }
}

/// Read valuation date, portfolio id and custodian from the document header
/// section.
pub fn read_portfolio_info(lines: &[Line]) -> Result<PortfolioInfo, ParseError> {
    let valuation_date = valuation_date(lines)?;

    let fund_name = lines
        .iter()
        .find(|line| cell_str(line.first()).starts_with("Fund Name"))
        .map(line_text)
        .unwrap_or_default();

    let portfolio = portfolio_id(&fund_name).ok_or_else(|| {
        log::error!("unsupported fund name: {:?}", fund_name);
        ParseError::UnsupportedPortfolioName(fund_name.clone())
    })?;
    let custodian = custodian(portfolio)
        .ok_or_else(|| ParseError::UnsupportedPortfolioName(portfolio.to_string()))?;

    Ok(PortfolioInfo {
        valuation_date,
        portfolio,
        custodian,
    })
}

/// The valuation date sits on the "Valuation Period" line: the third numeric
/// cell is the current period end, stored as a date serial.
fn valuation_date(lines: &[Line]) -> Result<String, ParseError> {
    let line = lines
        .iter()
        .find(|line| cell_str(line.first()).starts_with("Valuation Period"))
        .ok_or(ParseError::ValuationDateNotFound)?;

    let serial = nth_numeric(line, 3).ok_or(ParseError::ValuationDateNotFound)?;
    Ok(date_to_string(serial_to_date(serial)?))
}

fn line_text(line: &Line) -> String {
    line.iter()
        .map(|cell| cell_str(Some(cell)))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
