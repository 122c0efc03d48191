use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Expiry bucket for cached search results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlBucket {
    /// Departing today: prices move fast
    Short,
    /// Departing within a week
    Medium,
    /// Departing in more than a week
    Long,
}

impl TtlBucket {
    pub fn as_secs(&self) -> u64 {
        match self {
            TtlBucket::Short => 60 * 60,
            TtlBucket::Medium => 6 * 60 * 60,
            TtlBucket::Long => 24 * 60 * 60,
        }
    }
}

impl fmt::Display for TtlBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TtlBucket::Short => write!(f, "short"),
            TtlBucket::Medium => write!(f, "medium"),
            TtlBucket::Long => write!(f, "long"),
        }
    }
}

/// Search dates that cannot be mapped to a bucket
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TtlError {
    #[error("invalid {field} '{value}', expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },
    #[error("{field} {date} is in the past")]
    PastDate { field: &'static str, date: NaiveDate },
    #[error("return date {return_date} is before departure date {departure}")]
    ReturnBeforeDeparture {
        departure: NaiveDate,
        return_date: NaiveDate,
    },
}

/// Picks the cache expiry of a search from how soon the traveller flies
pub struct TtlSelector;

impl TtlSelector {
    /// Bucket for a search relative to `today`.
    ///
    /// The nearer of the two dates decides: more than 7 days away is `Long`,
    /// 1 to 7 days is `Medium`, today is `Short`.
    pub fn select(
        departure: NaiveDate,
        return_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<TtlBucket, TtlError> {
        let departure_days = days_until("departure date", departure, today)?;

        let days = match return_date {
            Some(return_date) => {
                if return_date < departure {
                    return Err(TtlError::ReturnBeforeDeparture {
                        departure,
                        return_date,
                    });
                }
                departure_days.min(days_until("return date", return_date, today)?)
            }
            None => departure_days,
        };

        Ok(match days {
            0 => TtlBucket::Short,
            1..=7 => TtlBucket::Medium,
            _ => TtlBucket::Long,
        })
    }

    /// Same as [`select`](Self::select) for `YYYY-MM-DD` strings
    pub fn select_str(
        departure: &str,
        return_date: Option<&str>,
        today: NaiveDate,
    ) -> Result<TtlBucket, TtlError> {
        let departure = parse_date("departure date", departure)?;
        let return_date = return_date
            .map(|value| parse_date("return date", value))
            .transpose()?;

        Self::select(departure, return_date, today)
    }
}

fn days_until(field: &'static str, date: NaiveDate, today: NaiveDate) -> Result<u64, TtlError> {
    let days = (date - today).num_days();
    if days < 0 {
        return Err(TtlError::PastDate { field, date });
    }
    Ok(days as u64)
}

pub(crate) fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, TtlError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| TtlError::InvalidDate {
        field,
        value: value.to_string(),
    })
}
