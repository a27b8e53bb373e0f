use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reporting interval (quarter number) a draft is written for, 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReportingPeriod(u32);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("`{input}` is not a whole number")]
    NotANumber { input: String },
    #[error("period {value} is outside 1..={total_periods}")]
    OutOfRange { value: i64, total_periods: u32 },
}

impl ReportingPeriod {
    pub fn new(value: u32, total_periods: u32) -> Result<Self, PeriodError> {
        if value == 0 || value > total_periods {
            return Err(PeriodError::OutOfRange { value: i64::from(value), total_periods });
        }
        Ok(Self(value))
    }

    /// Parses free-text user input. Surrounding whitespace is ignored.
    pub fn parse(input: &str, total_periods: u32) -> Result<Self, PeriodError> {
        let trimmed = input.trim();
        let value = trimmed
            .parse::<i64>()
            .map_err(|_| PeriodError::NotANumber { input: trimmed.to_string() })?;

        match u32::try_from(value) {
            Ok(value) if value >= 1 && value <= total_periods => Ok(Self(value)),
            _ => Err(PeriodError::OutOfRange { value, total_periods }),
        }
    }

    pub fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{PeriodError, ReportingPeriod};

    #[test]
    fn parses_trimmed_numbers_in_range() {
        assert_eq!(ReportingPeriod::parse(" 3 ", 4).map(ReportingPeriod::number), Ok(3));
        assert_eq!(ReportingPeriod::parse("1", 1).map(ReportingPeriod::number), Ok(1));
    }

    #[test]
    fn classifies_failures() {
        assert!(matches!(
            ReportingPeriod::parse("two", 4),
            Err(PeriodError::NotANumber { ref input }) if input == "two"
        ));
        assert!(matches!(ReportingPeriod::parse("", 4), Err(PeriodError::NotANumber { .. })));
        assert!(matches!(ReportingPeriod::parse("2.5", 4), Err(PeriodError::NotANumber { .. })));
        assert_eq!(
            ReportingPeriod::parse("-1", 4),
            Err(PeriodError::OutOfRange { value: -1, total_periods: 4 })
        );
        assert_eq!(
            ReportingPeriod::parse("0", 4),
            Err(PeriodError::OutOfRange { value: 0, total_periods: 4 })
        );
        assert_eq!(
            ReportingPeriod::new(5, 4),
            Err(PeriodError::OutOfRange { value: 5, total_periods: 4 })
        );
    }

    proptest! {
        #[test]
        fn every_in_range_value_is_accepted(total in 1u32..64, pick in 0u32..64) {
            let value = pick % total + 1;
            let parsed = ReportingPeriod::parse(&value.to_string(), total);
            prop_assert_eq!(parsed.map(ReportingPeriod::number), Ok(value));
        }

        #[test]
        fn every_out_of_range_value_is_rejected(total in 1u32..64, value in any::<i64>()) {
            prop_assume!(value < 1 || value > i64::from(total));
            let is_out_of_range = matches!(
                ReportingPeriod::parse(&value.to_string(), total),
                Err(PeriodError::OutOfRange { .. })
            );
            prop_assert!(is_out_of_range);
        }
    }
}
