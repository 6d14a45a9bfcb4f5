use calamine::{Data, Range};
use serde_json::Value;

/// One worksheet row, one cell per column.
pub type Line = Vec<Data>;

/// Materialize a worksheet range as lines, trimming textual cells.
///
/// No row filtering happens here; blank-row handling belongs to the section
/// segmenter.
pub fn range_to_lines(range: &Range<Data>) -> Vec<Line> {
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::String(s) => Data::String(s.trim().to_string()),
                    other => other.clone(),
                })
                .collect()
        })
        .collect()
}

pub fn cell_str(cell: Option<&Data>) -> String {
    let Some(c) = cell else {
        return String::new();
    };

    match c {
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Empty => String::new(),
        _ => c.to_string(),
    }
}

pub fn cell_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::DateTime(dt) => Some(dt.as_f64()),
        _ => None,
    }
}

/// A cell that contributes nothing to a record: empty, or an empty string.
pub fn cell_is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Convert a cell into the JSON value stored on a record.
pub fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::String(s) => Value::String(s.clone()),
        Data::Float(f) => Value::from(*f),
        Data::Int(i) => Value::from(*i),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::from(dt.as_f64()),
        Data::Empty => Value::Null,
        other => Value::String(other.to_string()),
    }
}

/// The n-th (1-based) numeric cell of a line. Date cells count as numeric
/// since the source stores dates as serial numbers.
pub fn nth_numeric(line: &Line, n: usize) -> Option<f64> {
    line.iter().filter_map(cell_f64).nth(n.saturating_sub(1))
}
