//! Billing periods — an ordered `(month, year)` value type.
//!
//! The original month arithmetic worked on `"Mar-2024"` strings and silently
//! returned malformed input unchanged. Here the string form is only a
//! display/storage encoding; parsing fails loudly and `next()` is total.

use crate::error::{ReconError, ReconResult};
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Calendar month, ordered January through December.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::Jan,
        Month::Feb,
        Month::Mar,
        Month::Apr,
        Month::May,
        Month::Jun,
        Month::Jul,
        Month::Aug,
        Month::Sep,
        Month::Oct,
        Month::Nov,
        Month::Dec,
    ];

    pub fn abbrev(self) -> &'static str {
        match self {
            Month::Jan => "Jan",
            Month::Feb => "Feb",
            Month::Mar => "Mar",
            Month::Apr => "Apr",
            Month::May => "May",
            Month::Jun => "Jun",
            Month::Jul => "Jul",
            Month::Aug => "Aug",
            Month::Sep => "Sep",
            Month::Oct => "Oct",
            Month::Nov => "Nov",
            Month::Dec => "Dec",
        }
    }

    pub fn from_abbrev(s: &str) -> Option<Month> {
        Month::ALL.iter().copied().find(|m| m.abbrev() == s)
    }

    /// 1-based month number, as chrono reports it.
    pub fn from_number(n: u32) -> Option<Month> {
        Month::ALL.get((n as usize).checked_sub(1)?).copied()
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One monthly billing cycle. Total order is (year, month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BillingPeriod {
    pub year: i32,
    pub month: Month,
}

impl BillingPeriod {
    pub fn new(month: Month, year: i32) -> Self {
        Self { year, month }
    }

    /// The period containing a transaction timestamp — the starting period
    /// of forward allocation.
    pub fn containing(ts: NaiveDateTime) -> Self {
        // chrono months are 1..=12, so from_number cannot fail here.
        let month = Month::from_number(ts.month()).unwrap_or(Month::Jan);
        Self {
            year: ts.year(),
            month,
        }
    }

    /// The following period. December rolls into January of the next year.
    pub fn next(self) -> Self {
        match self.month {
            Month::Dec => Self {
                year: self.year + 1,
                month: Month::Jan,
            },
            m => Self {
                year: self.year,
                month: Month::ALL[m.index() + 1],
            },
        }
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.month.abbrev(), self.year)
    }
}

impl FromStr for BillingPeriod {
    type Err = ReconError;

    fn from_str(s: &str) -> ReconResult<Self> {
        let malformed = || ReconError::MalformedPeriod {
            input: s.to_string(),
        };
        let (m, y) = s.split_once('-').ok_or_else(malformed)?;
        let month = Month::from_abbrev(m).ok_or_else(malformed)?;
        let year: i32 = y.parse().map_err(|_| malformed())?;
        Ok(Self { year, month })
    }
}

// Stored and serialized in the display form, e.g. "Mar-2024".
impl Serialize for BillingPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BillingPeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn p(s: &str) -> BillingPeriod {
        s.parse().unwrap()
    }

    #[test]
    fn ordering_is_year_then_month() {
        assert!(p("Dec-2023") < p("Jan-2024"));
        assert!(p("Mar-2024") < p("Apr-2024"));
        assert_eq!(p("Jul-2024"), p("Jul-2024"));
    }

    #[test]
    fn next_advances_and_rolls_over_december() {
        assert_eq!(p("Mar-2024").next(), p("Apr-2024"));
        assert_eq!(p("Dec-2024").next(), p("Jan-2025"));
    }

    #[test]
    fn display_and_parse_round_trip() {
        for s in ["Jan-2023", "Dec-1999", "Sep-2031"] {
            assert_eq!(p(s).to_string(), s);
        }
    }

    #[test]
    fn malformed_input_fails_loudly() {
        for bad in ["", "Mar2024", "Foo-2024", "Mar-twenty", "Mar-", "-2024"] {
            assert!(
                bad.parse::<BillingPeriod>().is_err(),
                "expected parse failure for {bad:?}"
            );
        }
    }

    #[test]
    fn containing_uses_the_transaction_month() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(14, 30, 22)
            .unwrap();
        assert_eq!(BillingPeriod::containing(ts), p("Mar-2024"));
    }

    #[test]
    fn serde_uses_display_form() {
        let json = serde_json::to_string(&p("Apr-2024")).unwrap();
        assert_eq!(json, "\"Apr-2024\"");
        let back: BillingPeriod = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p("Apr-2024"));
    }
}
