//! Invoice number derivation.
//!
//! Invoice numbers have the form `INV{year}{month}{seq}`, e.g. `INV2024010042`: a four digit year, two digit month,
//! and a zero-padded sequence of at least four digits that restarts at 0001 each month and simply grows a fifth
//! digit past 9999. The next sequence value is derived from the highest existing number sharing the same year/month
//! prefix, where "highest" orders by length before comparing lexicographically.

use chrono::{DateTime, Datelike, Utc};
use log::warn;

pub const INVOICE_PREFIX: &str = "INV";

/// The year/month prefix for invoices issued at `when`, e.g. "INV202401".
pub fn prefix_for(when: DateTime<Utc>) -> String {
    format!("{INVOICE_PREFIX}{:04}{:02}", when.year(), when.month())
}

/// Derives the next invoice number for the given prefix. `latest` is the highest existing invoice number with that
/// prefix (longest first, then lexicographically greatest), or `None` if the month has no invoices yet.
pub fn next_for_prefix(prefix: &str, latest: Option<&str>) -> String {
    let next_seq = match latest {
        None => 1,
        Some(number) => match number.strip_prefix(prefix).and_then(|seq| seq.parse::<u32>().ok()) {
            Some(seq) => seq + 1,
            None => {
                warn!("Existing invoice number {number} does not match prefix {prefix}. Restarting sequence at 0001");
                1
            },
        },
    };
    format!("{prefix}{next_seq:04}")
}
