use crate::error::ParseError;
use crate::grid::{cell_str, Line};

/// Map one bilingual header pair to its canonical field name.
///
/// `Some("")` marks a column that is recognized but deliberately carries no
/// record field. `None` means the pair is unknown. The table is append-only:
/// a new document layout must surface as an `UnknownHeader` failure here,
/// never as a silently mis-mapped column.
fn map_header(first: &str, second: &str) -> Option<&'static str> {
    let field = match (first, second) {
        ("", "") => "",
        ("項目", "Description") => "description",

        // Bond columns
        ("票面值", "Par Amt") => "quantity",
        ("幣值", "CCY") => "currency",
        ("上市 (是/否)", "Listed (Y/N)") => "is_listed",
        ("Primary", "Exchange") => "listed_location",
        ("(AVG) FX", "for TXN") => "fx_on_trade_day",
        ("Int.", "Rate (%)") => "coupon_rate",
        ("Int.", "Start Day") => "coupon_start_date",
        ("到期日", "Maturity") => "maturity_date",
        ("Cost", "(%)") => "average_cost",
        ("Price", "(%)") => "price",
        ("(Amortized)", "(%)") => "amortized_cost",
        ("成本價", "Book Cost") => "book_cost",
        ("Int.", "Bought") => "interest_bought",
        ("市價", "M. Value") => "market_value",
        ("Adjusted Value", "(Amortized)") => "amortized_value",
        ("應收利息", "Accr. Int.") => "accrued_interest",
        ("Year-End", "Amortization") => "amortized_gain_loss",
        ("Gain/(Loss)", "M. Value") => "market_gain_loss",
        ("FX", "HKD Equiv.") => "fx_gain_loss_hkd",
        ("%", "(Fund)") => "percentage_of_fund",

        // Macau fund variants of the bond columns
        ("", "Listed (Y/N)") => "is_listed",
        ("Location", "of Listed") => "listed_location",
        ("FX", "MOP Equiv.") => "fx_gain_loss_mop",

        // Equity columns
        ("股數", "Share") => "quantity",
        ("最後交易日", "Latest V.D.") => "last_trade_date",
        ("Avg.", "Price") => "average_cost",
        ("Market", "Price") => "price",

        // Cash columns
        ("戶口號碼", "Account No.") => "account_number",
        ("FX", "for TXN") => "fx_on_trade_day",
        ("FX", "at TXN") => "fx_on_trade_day",
        ("市值", "M. Value") => "market_value",

        // Futures columns
        ("合約數量", "No. of Contracts") => "quantity",
        ("", "Long/ Short") => "long_short",
        ("", "Trade Date") => "trade_date",

        // Fixed deposit columns
        ("FX", "at V.D.") => "fx_on_trade_day",
        ("交易日", "V.D.") => "trade_date",
        ("Int.", "Rate(%)") => "interest_rate",

        _ => return None,
    };
    Some(field)
}

/// Resolve the two-line header block into canonical field names, one per
/// column.
///
/// Resolution stops once the `percentage_of_fund` column is reached: the
/// layout author appends volatile columns past that point (yield figures,
/// purchase-date remnants) which are never consulted.
pub fn resolve_headers(header_lines: &[Line]) -> Result<Vec<&'static str>, ParseError> {
    let [first, second] = header_lines else {
        return Err(ParseError::HeaderNotFound);
    };

    let mut fields = Vec::new();
    for i in 0..first.len().max(second.len()) {
        let a = cell_str(first.get(i));
        let b = cell_str(second.get(i));
        let field = map_header(&a, &b).ok_or_else(|| {
            log::error!("unknown header pair: ({:?}, {:?})", a, b);
            ParseError::UnknownHeader(a.clone(), b.clone())
        })?;
        fields.push(field);
        if field == "percentage_of_fund" {
            break;
        }
    }
    Ok(fields)
}
