//! Provider API adapters implementing the `ProviderAdapter` port.

mod google;
mod outlook;

pub use google::GoogleCalendarAdapter;
pub use outlook::OutlookCalendarAdapter;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use jobtrail_domain::{CalendarError, Result};

/// Map a non-success provider response into a domain error, consuming the
/// body for the message.
pub(crate) async fn error_from_response(
    provider: &str,
    response: reqwest::Response,
) -> CalendarError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = body.chars().take(512).collect::<String>();

    match status.as_u16() {
        401 | 403 => CalendarError::Auth(format!("{provider} rejected credentials ({status})")),
        404 | 410 => CalendarError::NotFound(format!("{provider} event not found ({status})")),
        _ => CalendarError::ProviderApi(format!("{provider} returned {status}: {detail}")),
    }
}

/// Parse an RFC 3339 timestamp from a provider payload.
pub(crate) fn parse_rfc3339(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)).map_err(|err| {
        CalendarError::ProviderApi(format!("unparsable {field} timestamp {value:?}: {err}"))
    })
}

/// Parse an all-day `YYYY-MM-DD` date as midnight UTC.
pub(crate) fn parse_all_day_date(value: &str, field: &str) -> Result<DateTime<Utc>> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|err| {
            CalendarError::ProviderApi(format!("unparsable {field} date {value:?}: {err}"))
        })
}
