//! Per-day counting of stored events.

use std::collections::BTreeMap;

use chrono::DateTime;

use super::HandlerError;
use super::window::CREATED_AT_FORMAT;

/// Counts `created_at` timestamps per calendar day (`YYYY-MM-DD`).
///
/// The day is taken in the timestamp's own offset.
///
/// # Errors
///
/// Returns an unknown-exception error if any timestamp does not parse.
pub fn tally_by_day<I, S>(created_at: I) -> Result<BTreeMap<String, u64>, HandlerError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts = BTreeMap::new();

    for value in created_at {
        let timestamp = DateTime::parse_from_str(value.as_ref(), CREATED_AT_FORMAT)
            .map_err(|_| HandlerError::tally_failed())?;
        let day = timestamp.date_naive().format("%Y-%m-%d").to_string();
        *counts.entry(day).or_insert(0) += 1;
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ErrorKind;

    #[test]
    fn test_counts_per_day() {
        let counts = tally_by_day([
            "05/Jan/2020:10:00:00 +0000",
            "05/Jan/2020:23:59:59 +0000",
            "06/Jan/2020:00:00:00 +0000",
        ])
        .unwrap();

        assert_eq!(counts.len(), 2);
        assert_eq!(counts["2020-01-05"], 2);
        assert_eq!(counts["2020-01-06"], 1);
    }

    #[test]
    fn test_empty_input() {
        let counts = tally_by_day(Vec::<String>::new()).unwrap();
        assert!(counts.is_empty());
    }

    #[test]
    fn test_malformed_timestamp() {
        let err = tally_by_day(["2020-01-05T10:00:00Z"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownException);
        assert_eq!(err.message, "Something went wrong with tallying dates.");
    }
}
