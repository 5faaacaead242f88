//! Loading populations from disk.

mod csv;

pub use self::csv::{parse_cell, CsvLoader, CsvOptions};
