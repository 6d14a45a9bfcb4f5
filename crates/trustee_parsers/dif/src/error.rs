use thiserror::Error;

/// Failures while reading a trustee valuation workbook.
///
/// Every variant means the document layout or content is not what the parser
/// expects; none are retryable, and all abort the current document so that no
/// partial record set reaches downstream reconciliation.
#[derive(Debug, Error)]
pub enum ParseError {
    /// No "Description" header line inside a holding section.
    #[error("section header block not found")]
    HeaderNotFound,

    /// A bilingual header pair missing from the lookup table. Signals a new
    /// or changed document layout; the table must be extended by hand.
    #[error("unknown column header pair: ({0:?}, {1:?})")]
    UnknownHeader(String, String),

    #[error("valuation date not found in document header")]
    ValuationDateNotFound,

    #[error("unsupported portfolio name: {0:?}")]
    UnsupportedPortfolioName(String),

    /// A section heading that matches none of the known category keywords.
    #[error("unsupported section type: {0:?}")]
    UnsupportedSectionType(String),

    #[error("security id not found in description: {0:?}")]
    SecurityIdNotFound(String),

    #[error("invalid date value: {0:?}")]
    InvalidDate(String),

    /// The "Current Portfolio" anchor row is missing from the summary sheet.
    #[error("summary anchor row not found")]
    SummaryAnchorNotFound,

    /// Bottom-up record totals disagree with the trustee's own summary.
    #[error("{category}: record sum {computed} does not reconcile with summary {expected}")]
    InconsistentRecordSum {
        category: String,
        expected: f64,
        computed: f64,
    },

    #[error("unit price {unit_price} does not reconcile with nav per unit {nav_per_unit}")]
    InconsistentNav { unit_price: f64, nav_per_unit: f64 },
}
