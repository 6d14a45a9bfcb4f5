use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

/// Turn records sharing a field set into csv-ready rows.
///
/// The first row holds the headers, the rest one row per record with values
/// in header order. Headers are either given explicitly or inferred from the
/// first record's keys (record field order is preserved by the parser, so the
/// inferred headers come out in document column order). Fields missing from a
/// record become empty strings.
pub fn records_to_rows(records: &[Value], headers: Option<&[&str]>) -> Vec<Vec<Value>> {
    if records.is_empty() {
        return Vec::new();
    }

    let headers: Vec<String> = match headers {
        Some(given) => given.iter().map(|h| h.to_string()).collect(),
        None => match records[0].as_object() {
            Some(obj) => obj.keys().cloned().collect(),
            None => Vec::new(),
        },
    };

    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(headers.iter().map(|h| Value::String(h.clone())).collect());

    for record in records {
        let row = headers
            .iter()
            .map(|h| {
                record
                    .get(h)
                    .cloned()
                    .unwrap_or_else(|| Value::String(String::new()))
            })
            .collect();
        rows.push(row);
    }

    rows
}

/// Write csv-ready rows as delimited text.
pub fn write_delimited<P: AsRef<Path>>(path: P, rows: &[Vec<Value>], delimiter: u8) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path.as_ref())
        .with_context(|| format!("Cannot create {}", path.as_ref().display()))?;

    for row in rows {
        let fields: Vec<String> = row.iter().map(value_to_field).collect();
        writer.write_record(&fields)?;
    }

    writer.flush()?;
    Ok(())
}

fn value_to_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
