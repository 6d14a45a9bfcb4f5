use crate::error::ParseError;
use crate::grid::{cell_f64, cell_is_blank, cell_str, Line};
use regex::Regex;

/// Top-level holding categories a valuation document may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionType {
    Cash,
    BrokerAccountCash,
    Bond,
    Equity,
    Futures,
    Forwards,
    FixedDepositCash,
}

impl SectionType {
    /// Canonical tag stored on each record's `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Cash => "cash",
            SectionType::BrokerAccountCash => "broker account cash",
            SectionType::Bond => "bond",
            SectionType::Equity => "equity",
            SectionType::Futures => "futures",
            SectionType::Forwards => "forwards",
            SectionType::FixedDepositCash => "fixed deposit cash",
        }
    }
}

/// Split the worksheet lines into sections.
///
/// A section starts on a line whose first cell begins with a Roman-numeral
/// heading ("I. Cash - CNY ...", "XIII. Futures ..."). Everything before the
/// first heading is the document header section (fund name, valuation
/// period), returned at index 0. Lines whose first 20 cells are blank are
/// dropped.
///
/// A holding row whose first cell happens to look like a Roman-numeral
/// heading would start a bogus section; that is an accepted risk of the
/// source format.
pub fn lines_to_sections(lines: Vec<Line>) -> Vec<Vec<Line>> {
    let marker = Regex::new(r"^[IVX]+\.?\s+").unwrap();

    let mut sections = Vec::new();
    let mut current: Vec<Line> = Vec::new();
    for line in lines.into_iter().filter(not_empty_line) {
        if marker.is_match(&cell_str(line.first())) {
            sections.push(current);
            current = vec![line];
        } else {
            current.push(line);
        }
    }
    sections.push(current);
    sections
}

fn not_empty_line(line: &Line) -> bool {
    line.iter().take(20).any(|cell| !cell_is_blank(cell))
}

/// Classify a section from its heading line: the holding category and, when
/// the heading carries one, the section currency.
pub fn classify_section(heading_line: &Line) -> Result<(SectionType, Option<String>), ParseError> {
    let heading = cell_str(heading_line.first());

    // "Broker Account" and "Fixed Deposit" must be probed before the bare
    // "Cash" keyword.
    let keywords = [
        (r"\sBroker Account(\s|$)", SectionType::BrokerAccountCash),
        (r"\sDebt Securities(\s|$)", SectionType::Bond),
        (r"\sEquities(\s|$)", SectionType::Equity),
        (r"\sFutures(\s|$)", SectionType::Futures),
        (r"\sForwards(\s|$)", SectionType::Forwards),
        (r"\sFixed Deposit(\s|$)", SectionType::FixedDepositCash),
        (r"\sCash(\s|$)", SectionType::Cash),
    ];

    let section_type = keywords
        .iter()
        .find(|(pattern, _)| Regex::new(pattern).unwrap().is_match(&heading))
        .map(|(_, ty)| *ty)
        .ok_or_else(|| {
            log::error!("unsupported section heading: {:?}", heading);
            ParseError::UnsupportedSectionType(heading.clone())
        })?;

    Ok((section_type, heading_currency(&heading)))
}

/// Currency suffix of a section heading: a dash followed by a 2-3 letter
/// code, with a trailing "$" sign normalized to "D" ("HK$" becomes "HKD").
fn heading_currency(heading: &str) -> Option<String> {
    let re = Regex::new(r"-\s*([A-Z]{2,3}\$?)(?:\s|$)").unwrap();
    re.captures(heading).map(|caps| caps[1].replace('$', "D"))
}

/// A section's lines split around the two-line column-header block.
#[derive(Debug)]
pub struct DividedSection {
    /// Exactly two lines; the second starts with "Description".
    pub header_lines: Vec<Line>,
    pub holding_lines: Vec<Line>,
    /// Everything from the "Total" line on. May carry an "Exchange Rate"
    /// line.
    pub trailer_lines: Vec<Line>,
}

/// Divide a section into header block, holding lines and trailer.
///
/// The second header line is the one starting with "Description"; the first
/// is the line right before it. Holdings run up to (exclusive) the first line
/// starting with "Total".
pub fn divide_section(lines: &[Line]) -> Result<DividedSection, ParseError> {
    let idx = lines
        .iter()
        .position(|line| cell_str(line.first()).starts_with("Description"))
        .ok_or(ParseError::HeaderNotFound)?;
    if idx == 0 {
        return Err(ParseError::HeaderNotFound);
    }

    let header_lines = vec![lines[idx - 1].clone(), lines[idx].clone()];

    let rest = &lines[idx + 1..];
    let total = rest
        .iter()
        .position(|line| cell_str(line.first()).starts_with("Total"));
    let (holding_lines, trailer_lines) = match total {
        Some(t) => (rest[..t].to_vec(), rest[t..].to_vec()),
        None => (rest.to_vec(), Vec::new()),
    };

    Ok(DividedSection {
        header_lines,
        holding_lines,
        trailer_lines,
    })
}

/// Exchange rate carried on a section's trailer, when present: the first
/// positive numeric cell of the "Exchange Rate" line.
pub fn trailer_exchange_rate(trailer_lines: &[Line]) -> Option<f64> {
    trailer_lines
        .iter()
        .find(|line| cell_str(line.first()).starts_with("Exchange Rate"))
        .and_then(|line| line.iter().filter_map(cell_f64).find(|v| *v > 0.0))
}
