pub mod rows;

// Re-export commonly used items
pub use crate::rows::{records_to_rows, write_delimited};
