//! The BSON datetime: a signed count of milliseconds since the Unix epoch.

use std::{
    fmt::{self, Display},
    time::{Duration, SystemTime},
};

use time::{
    format_description::well_known::{Iso8601, Rfc3339},
    OffsetDateTime,
};

use crate::error::{Error, Result};

const NANOS_PER_MILLI: i128 = 1_000_000;

/// Milliseconds since 1970-01-01T00:00:00Z, ignoring leap seconds.
///
/// Conversions into this type drop sub-millisecond precision by flooring, so instants before the
/// epoch keep their ordering. Values outside the `i64` range saturate at [`DateTime::MIN`] or
/// [`DateTime::MAX`].
///
/// ```
/// # fn main() -> bson_core::error::Result<()> {
/// let dt = bson_core::DateTime::parse_rfc3339_str("1998-02-12T00:01:00.023Z")?;
/// assert_eq!(dt.timestamp_millis(), 887_241_660_023);
/// # Ok(())
/// # }
/// ```
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Copy, Clone)]
pub struct DateTime(i64);

impl DateTime {
    pub const MAX: Self = Self(i64::MAX);
    pub const MIN: Self = Self(i64::MIN);

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn timestamp_millis(self) -> i64 {
        self.0
    }

    /// From whole seconds since the epoch, saturating at the representable range.
    pub fn from_unix_secs(secs: i64) -> Self {
        Self::saturating(i128::from(secs) * 1000)
    }

    /// From a `timeval`-style pair of seconds and microseconds. The microseconds may be
    /// negative or exceed one second; the sum is floored to whole milliseconds.
    pub fn from_timeval(secs: i64, micros: i64) -> Self {
        let micros = i128::from(secs) * 1_000_000 + i128::from(micros);
        Self::saturating(micros.div_euclid(1000))
    }

    pub fn now() -> Self {
        SystemTime::now().into()
    }

    fn saturating(millis: i128) -> Self {
        match i64::try_from(millis) {
            Ok(millis) => Self(millis),
            Err(_) if millis > 0 => Self::MAX,
            Err(_) => Self::MIN,
        }
    }

    pub(crate) fn from_time(odt: OffsetDateTime) -> Self {
        Self::saturating(odt.unix_timestamp_nanos().div_euclid(NANOS_PER_MILLI))
    }

    /// `None` when the instant lies outside the years the `time` crate supports.
    fn to_time(self) -> Option<OffsetDateTime> {
        OffsetDateTime::UNIX_EPOCH.checked_add(time::Duration::milliseconds(self.0))
    }

    pub fn from_system_time(st: SystemTime) -> Self {
        let nanos = match st.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(after) => after.as_nanos() as i128,
            Err(before) => -(before.duration().as_nanos() as i128),
        };
        Self::saturating(nanos.div_euclid(NANOS_PER_MILLI))
    }

    pub fn to_system_time(self) -> SystemTime {
        let magnitude = Duration::from_millis(self.0.unsigned_abs());
        if self.0 < 0 {
            SystemTime::UNIX_EPOCH - magnitude
        } else {
            SystemTime::UNIX_EPOCH + magnitude
        }
    }

    /// Formats the instant as RFC 3339 in UTC. Fails for instants the `time` crate cannot
    /// represent.
    pub fn try_to_rfc3339_string(self) -> Result<String> {
        self.to_time()
            .ok_or_else(|| Error::datetime(format!("{} ms is out of range", self.0)))?
            .format(&Rfc3339)
            .map_err(Error::datetime)
    }

    pub fn parse_rfc3339_str(s: impl AsRef<str>) -> Result<Self> {
        OffsetDateTime::parse(s.as_ref(), &Rfc3339)
            .map(Self::from_time)
            .map_err(Error::datetime)
    }

    /// Parse an ISO-8601 date string. RFC 3339 is tried first, then the looser ISO-8601 grammar.
    pub(crate) fn parse_iso8601_str(s: &str) -> Result<Self> {
        OffsetDateTime::parse(s, &Rfc3339)
            .or_else(|_| OffsetDateTime::parse(s, &Iso8601::DEFAULT))
            .map(Self::from_time)
            .map_err(Error::datetime)
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_time() {
            Some(odt) => f.debug_tuple("DateTime").field(&odt).finish(),
            None => f.debug_tuple("DateTime").field(&self.0).finish(),
        }
    }
}

impl Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_time() {
            Some(odt) => Display::fmt(&odt, f),
            None => write!(f, "{} ms", self.0),
        }
    }
}

impl From<SystemTime> for DateTime {
    fn from(st: SystemTime) -> Self {
        Self::from_system_time(st)
    }
}

impl From<DateTime> for SystemTime {
    fn from(dt: DateTime) -> Self {
        dt.to_system_time()
    }
}

impl From<OffsetDateTime> for DateTime {
    fn from(odt: OffsetDateTime) -> Self {
        Self::from_time(odt)
    }
}
