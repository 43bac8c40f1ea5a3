//! Read request parsing and the query window.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::HandlerError;

/// Date format of the request fields.
pub const REQUEST_DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp format of `created_at`, the API's request time.
pub const CREATED_AT_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Body the `POST` route maps onto the function input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    /// First day, `YYYY-MM-DD`.
    pub start_date: String,
    /// Last day, `YYYY-MM-DD`.
    pub end_date: String,
    /// Application whose events are counted.
    pub application: String,
}

/// Inclusive `created_at` range covering whole days in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryWindow {
    /// First day of the window.
    pub first_day: NaiveDate,
    /// Last day of the window.
    pub last_day: NaiveDate,
}

impl QueryWindow {
    /// Builds the window from a request.
    ///
    /// # Errors
    ///
    /// Returns a validation error if either date does not parse, or if the
    /// start date is after the end date.
    pub fn from_request(request: &ReadRequest) -> Result<Self, HandlerError> {
        let parse = |value: &str| {
            NaiveDate::parse_from_str(value.trim(), REQUEST_DATE_FORMAT)
                .map_err(|_| HandlerError::invalid_values())
        };
        let first_day = parse(&request.start_date)?;
        let last_day = parse(&request.end_date)?;

        if first_day > last_day {
            return Err(HandlerError::start_after_end());
        }

        Ok(Self {
            first_day,
            last_day,
        })
    }

    /// Lower bound, `dd/Mon/YYYY:00:00:00 +0000`.
    #[must_use]
    pub fn start(&self) -> String {
        format!("{} +0000", self.first_day.format("%d/%b/%Y:00:00:00"))
    }

    /// Upper bound, `dd/Mon/YYYY:23:59:59 +0000`.
    #[must_use]
    pub fn end(&self) -> String {
        format!("{} +0000", self.last_day.format("%d/%b/%Y:23:59:59"))
    }

    /// Returns true if the day of a `created_at` timestamp falls inside.
    #[must_use]
    pub fn contains_day(&self, day: NaiveDate) -> bool {
        (self.first_day..=self.last_day).contains(&day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ErrorKind;

    fn request(start: &str, end: &str) -> ReadRequest {
        ReadRequest {
            start_date: start.to_string(),
            end_date: end.to_string(),
            application: String::from("player"),
        }
    }

    #[test]
    fn test_window_bounds() {
        let window = QueryWindow::from_request(&request("2020-01-05", "2020-02-01")).unwrap();
        assert_eq!(window.start(), "05/Jan/2020:00:00:00 +0000");
        assert_eq!(window.end(), "01/Feb/2020:23:59:59 +0000");
    }

    #[test]
    fn test_single_day_window() {
        let window = QueryWindow::from_request(&request("2020-03-10", "2020-03-10")).unwrap();
        assert!(window.contains_day(NaiveDate::from_ymd_opt(2020, 3, 10).unwrap()));
        assert!(!window.contains_day(NaiveDate::from_ymd_opt(2020, 3, 11).unwrap()));
    }

    #[test]
    fn test_unparseable_dates() {
        let err = QueryWindow::from_request(&request("2020-13-01", "2020-01-01")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationException);
        assert_eq!(err.message, "Your values are incorrect.");

        assert!(QueryWindow::from_request(&request("yesterday", "2020-01-01")).is_err());
    }

    #[test]
    fn test_start_after_end() {
        let err = QueryWindow::from_request(&request("2020-02-01", "2020-01-31")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationException);
        assert_eq!(
            err.message,
            "The start date is further in the future than the end date."
        );
    }

    #[test]
    fn test_request_from_json() {
        let request: ReadRequest = serde_json::from_str(
            r#"{"start_date":"2020-01-01","end_date":"2020-01-02","application":"player"}"#,
        )
        .unwrap();
        assert_eq!(request.application, "player");
    }
}
