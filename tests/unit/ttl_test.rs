//! Travel-date based expiry selection

use chrono::{Duration, NaiveDate};
use flight_search::cache::{TtlBucket, TtlError, TtlSelector};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 3, 10).unwrap()
}

#[test]
fn test_departure_today_is_short() {
    assert_eq!(TtlSelector::select(today(), None, today()), Ok(TtlBucket::Short));
}

#[test]
fn test_medium_window_edges() {
    let one = today() + Duration::days(1);
    let seven = today() + Duration::days(7);

    assert_eq!(TtlSelector::select(one, None, today()), Ok(TtlBucket::Medium));
    assert_eq!(TtlSelector::select(seven, None, today()), Ok(TtlBucket::Medium));
}

#[test]
fn test_beyond_a_week_is_long() {
    let eight = today() + Duration::days(8);
    assert_eq!(TtlSelector::select(eight, None, today()), Ok(TtlBucket::Long));
}

#[test]
fn test_nearest_date_wins_for_round_trips() {
    let departure = today() + Duration::days(3);
    let return_date = today() + Duration::days(20);

    assert_eq!(
        TtlSelector::select(departure, Some(return_date), today()),
        Ok(TtlBucket::Medium)
    );
}

#[test]
fn test_same_day_return_is_allowed() {
    let departure = today() + Duration::days(10);
    assert_eq!(
        TtlSelector::select(departure, Some(departure), today()),
        Ok(TtlBucket::Long)
    );
}

#[test]
fn test_rejected_dates() {
    let yesterday = today() - Duration::days(1);
    assert!(matches!(
        TtlSelector::select(yesterday, None, today()),
        Err(TtlError::PastDate { .. })
    ));

    let departure = today() + Duration::days(5);
    let return_date = today() + Duration::days(2);
    assert!(matches!(
        TtlSelector::select(departure, Some(return_date), today()),
        Err(TtlError::ReturnBeforeDeparture { .. })
    ));

    assert!(matches!(
        TtlSelector::select_str("10/03/2030", None, today()),
        Err(TtlError::InvalidDate { .. })
    ));
}

#[test]
fn test_string_dates() {
    assert_eq!(
        TtlSelector::select_str("2030-03-12", Some("2030-03-30"), today()),
        Ok(TtlBucket::Medium)
    );
}

#[test]
fn test_bucket_durations() {
    assert_eq!(TtlBucket::Short.as_secs(), 3_600);
    assert_eq!(TtlBucket::Medium.as_secs(), 21_600);
    assert_eq!(TtlBucket::Long.as_secs(), 86_400);
}
