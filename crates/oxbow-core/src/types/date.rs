use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use time::{Duration, Month, OffsetDateTime, PrimitiveDateTime, Time};

///
/// Date
///
/// Point in time carried as milliseconds since the Unix epoch, which is the
/// representation the storage engine uses for date properties. Calendar
/// construction and display go through the `time` crate.
///

#[derive(
    Clone, Copy, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[repr(transparent)]
pub struct Date(i64);

impl Date {
    pub const EPOCH: Self = Self(0);
    pub const MIN: Self = Self(i64::MIN);
    pub const MAX: Self = Self(i64::MAX);

    #[must_use]
    pub const fn from_epoch_millis(millis: i64) -> Self {
        Self(millis)
    }

    #[must_use]
    pub const fn epoch_millis(self) -> i64 {
        self.0
    }

    /// Midnight UTC on the given calendar day. `None` for invalid dates.
    #[must_use]
    pub fn from_calendar(year: i32, month: u8, day: u8) -> Option<Self> {
        let month = Month::try_from(month).ok()?;
        let date = time::Date::from_calendar_date(year, month, day).ok()?;
        let datetime = PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc();
        Some(Self(datetime.unix_timestamp() * 1_000))
    }

    #[must_use]
    pub fn saturating_add_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    fn to_offset(self) -> Option<OffsetDateTime> {
        let seconds = self.0.div_euclid(1_000);
        let millis = self.0.rem_euclid(1_000);
        let base = OffsetDateTime::from_unix_timestamp(seconds).ok()?;
        base.checked_add(Duration::milliseconds(millis))
    }
}

impl Debug for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Date({self})")
    }
}

impl Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_offset() {
            Some(datetime) => {
                let month: u8 = datetime.month().into();
                write!(
                    f,
                    "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
                    datetime.year(),
                    month,
                    datetime.day(),
                    datetime.hour(),
                    datetime.minute(),
                    datetime.second(),
                    datetime.millisecond(),
                )
            }
            None => write!(f, "{}ms", self.0),
        }
    }
}

///
/// TESTS
///
