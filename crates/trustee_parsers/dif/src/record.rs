use crate::error::ParseError;
use crate::grid::{cell_is_blank, cell_str, cell_to_value, Line};
use crate::header::resolve_headers;
use crate::section::{
    classify_section, divide_section, trailer_exchange_rate, SectionType,
};
use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use serde_json::{Map, Value};

/// Accounting treatment of a holdings sub-block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountingTreatment {
    Trading,
    Htm,
    Afs,
}

impl AccountingTreatment {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountingTreatment::Trading => "trading",
            AccountingTreatment::Htm => "htm",
            AccountingTreatment::Afs => "afs",
        }
    }
}

/// Classify an accounting-treatment marker line, e.g.
/// "(i) Held to Maturity (Amortized Cost)". Marker lines carry only the
/// label, so any line with data past the first cell is an ordinary holding
/// row.
fn marker_treatment(line: &Line) -> Option<AccountingTreatment> {
    if !line.iter().skip(1).all(cell_is_blank) {
        return None;
    }

    let text = cell_str(line.first()).to_lowercase();
    if text.contains("trading") {
        Some(AccountingTreatment::Trading)
    } else if text.contains("held to maturity") || text.contains("amortized cost") {
        Some(AccountingTreatment::Htm)
    } else if text.contains("available for sales") || text.contains("market value") {
        Some(AccountingTreatment::Afs)
    } else {
        None
    }
}

/// Zip holding lines against the resolved headers.
///
/// A treatment marker tags every row until the next marker or the section
/// end; sections without markers get the empty-string treatment on all rows.
pub fn lines_to_records(headers: &[&'static str], lines: &[Line]) -> Vec<Map<String, Value>> {
    let mut records = Vec::new();
    let mut accounting = "";
    for line in lines {
        if let Some(treatment) = marker_treatment(line) {
            accounting = treatment.as_str();
            continue;
        }

        let mut record = line_to_record(headers, line);
        record.insert(
            "accounting".to_string(),
            Value::String(accounting.to_string()),
        );
        records.push(record);
    }
    records
}

fn line_to_record(headers: &[&'static str], line: &Line) -> Map<String, Value> {
    let mut record = Map::new();
    for (header, cell) in headers.iter().zip(line.iter()) {
        if header.is_empty() || cell_is_blank(cell) {
            continue;
        }
        record.insert((*header).to_string(), cell_to_value(cell));
    }
    record
}

/// Parse one holding section into enriched records.
///
/// Rows without a real position (neither quantity nor book cost) are
/// dropped; the survivors get the section type, section currency (unless the
/// row carries its own), trailer exchange rate, security identifiers and
/// normalized dates.
pub fn section_to_records(lines: &[Line]) -> Result<Vec<Value>, ParseError> {
    let (section_type, currency) = classify_section(&lines[0])?;
    let divided = divide_section(lines)?;
    let headers = resolve_headers(&divided.header_lines)?;
    let exchange_rate = trailer_exchange_rate(&divided.trailer_lines);

    let mut records = Vec::new();
    for mut record in lines_to_records(&headers, &divided.holding_lines) {
        if !non_empty_position(&record) {
            continue;
        }

        record.insert(
            "type".to_string(),
            Value::String(section_type.as_str().to_string()),
        );
        if let Some(ccy) = &currency {
            if !record.contains_key("currency") {
                record.insert("currency".to_string(), Value::String(ccy.clone()));
            }
        }
        if let Some(rate) = exchange_rate {
            record.insert("exchange_rate".to_string(), Value::from(rate));
        }

        match section_type {
            SectionType::Bond | SectionType::Equity => {
                add_security_id(&mut record, section_type)?
            }
            SectionType::Cash | SectionType::BrokerAccountCash => split_bank_account(&mut record),
            _ => {}
        }

        // Futures maturities do not follow the serial-date convention and are
        // left untouched.
        if section_type != SectionType::Futures {
            normalize_dates(&mut record)?;
        }

        records.push(Value::Object(record));
    }
    Ok(records)
}

/// A record is a real position only if it carries a non-zero quantity or
/// book cost. The trustee keeps printing closed positions as rows of zeros.
fn non_empty_position(record: &Map<String, Value>) -> bool {
    ["quantity", "book_cost"].iter().any(|key| match record.get(*key) {
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    })
}

/// Pull the security identifier out of the description, e.g.
/// "(USY9896RAB79) Zoomlion HK SPV Co Ltd 6.125%". Twelve characters is an
/// ISIN; shorter bond codes are stored as ISINs too, shorter equity codes are
/// the trustee's internal tickers and get converted.
fn add_security_id(
    record: &mut Map<String, Value>,
    section_type: SectionType,
) -> Result<(), ParseError> {
    let description = record
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let re = Regex::new(r"^\(([A-Za-z0-9]{5,12})\)").unwrap();
    let code = match re.captures(&description) {
        Some(caps) => caps[1].to_string(),
        None => {
            log::error!("no security id in description: {:?}", description);
            return Err(ParseError::SecurityIdNotFound(description));
        }
    };

    if code.len() == 12 || section_type == SectionType::Bond {
        record.insert("isin".to_string(), Value::String(code));
    } else {
        record.insert(
            "ticker".to_string(),
            Value::String(ticker_from_code(&code)),
        );
    }
    Ok(())
}

/// Convert the trustee's internal equity code to an exchange ticker:
/// "H0939" becomes "939 HK". Codes outside the known pattern pass through
/// unchanged.
pub fn ticker_from_code(code: &str) -> String {
    let re = Regex::new(r"^[HN](\d{4})$").unwrap();
    match re.captures(code) {
        Some(caps) => format!("{} HK", caps[1].trim_start_matches('0')),
        None => {
            log::warn!("ticker code not converted: {}", code);
            code.to_string()
        }
    }
}

/// Cash descriptions look like "Bank of China - Current Account"; split them
/// into the bank and the account type (empty when there is no dash).
fn split_bank_account(record: &mut Map<String, Value>) {
    let description = record
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let (bank, account_type) = match description.split_once('-') {
        Some((bank, account_type)) => (bank.trim().to_string(), account_type.trim().to_string()),
        None => (description.trim().to_string(), String::new()),
    };
    record.insert("bank".to_string(), Value::String(bank));
    record.insert("account_type".to_string(), Value::String(account_type));
}

const DATE_FIELDS: [&str; 4] = [
    "coupon_start_date",
    "maturity_date",
    "last_trade_date",
    "trade_date",
];

fn normalize_dates(record: &mut Map<String, Value>) -> Result<(), ParseError> {
    for field in DATE_FIELDS {
        let Some(value) = record.get(field) else {
            continue;
        };
        let formatted = match value {
            Value::Number(n) => {
                let serial = n
                    .as_f64()
                    .ok_or_else(|| ParseError::InvalidDate(n.to_string()))?;
                date_to_string(serial_to_date(serial)?)
            }
            Value::String(s) => {
                let date = NaiveDate::parse_from_str(s, "%d/%m/%Y")
                    .map_err(|_| ParseError::InvalidDate(s.clone()))?;
                date_to_string(date)
            }
            other => return Err(ParseError::InvalidDate(other.to_string())),
        };
        record.insert(field.to_string(), Value::String(formatted));
    }
    Ok(())
}

/// Convert a spreadsheet date serial to a calendar date. Serial 1 is
/// 1899-12-31 under the source engine's convention (which treats 1900 as a
/// leap year), so the 1899-12-30 base reproduces it for every date in range.
pub fn serial_to_date(serial: f64) -> Result<NaiveDate, ParseError> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
    base.checked_add_signed(Duration::days(serial as i64))
        .ok_or_else(|| ParseError::InvalidDate(serial.to_string()))
}

/// Format as the trustee convention "yyyy-m-d", no zero padding.
pub fn date_to_string(date: NaiveDate) -> String {
    format!("{}-{}-{}", date.year(), date.month(), date.day())
}
