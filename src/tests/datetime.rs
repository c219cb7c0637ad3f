use std::time::{Duration, SystemTime};

use pretty_assertions::assert_eq;

use crate::DateTime;

#[test]
fn rfc3339_to_datetime() {
    let rfc = "2020-06-09T10:58:07.095Z";
    let date =
        time::OffsetDateTime::parse(rfc, &time::format_description::well_known::Rfc3339).unwrap();
    let parsed = DateTime::parse_rfc3339_str(rfc).unwrap();
    assert_eq!(parsed, DateTime::from_time(date));
    assert_eq!(parsed.try_to_rfc3339_string().unwrap(), rfc);
}

#[test]
fn invalid_rfc3339_to_datetime() {
    let a = "2020-06-09T10:58:07-095Z";
    let b = "2020-06-09T10:58:07.095";
    let c = "2020-06-09T10:62:07.095Z";
    assert!(DateTime::parse_rfc3339_str(a).is_err());
    assert!(DateTime::parse_rfc3339_str(b).is_err());
    assert!(DateTime::parse_rfc3339_str(c).is_err());
}

#[test]
fn datetime_to_rfc3339() {
    assert_eq!(
        DateTime::from_millis(0).try_to_rfc3339_string().unwrap(),
        "1970-01-01T00:00:00Z"
    );
}

#[test]
fn invalid_datetime_to_rfc3339() {
    assert!(DateTime::MAX.try_to_rfc3339_string().is_err());
}

#[test]
fn sub_millisecond_precision_is_floored() {
    let after = SystemTime::UNIX_EPOCH + Duration::from_micros(1_500);
    assert_eq!(DateTime::from_system_time(after).timestamp_millis(), 1);

    let before = SystemTime::UNIX_EPOCH - Duration::from_micros(1_500);
    assert_eq!(DateTime::from_system_time(before).timestamp_millis(), -2);

    let parsed = DateTime::parse_rfc3339_str("1969-12-31T23:59:59.9995Z").unwrap();
    assert_eq!(parsed.timestamp_millis(), -1);
}

#[test]
fn system_time_round_trip() {
    for millis in [0, 1, -1, 1_591_700_287_095, -62_135_596_800_000] {
        let dt = DateTime::from_millis(millis);
        assert_eq!(DateTime::from_system_time(dt.to_system_time()), dt);
    }
}

#[test]
fn iso8601_offsets_are_applied() {
    let basic = DateTime::parse_iso8601_str("2020-06-09T10:58:07.095+01:00").unwrap();
    let extended = DateTime::parse_rfc3339_str("2020-06-09T09:58:07.095Z").unwrap();
    assert_eq!(basic, extended);
}
