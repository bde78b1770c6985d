use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// `count` messages per `per_seconds` seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RateSpec {
    pub count: u32,
    pub per_seconds: f64,
}

impl RateSpec {
    pub fn new(count: u32, per_seconds: f64) -> Self {
        Self { count, per_seconds }
    }

    pub fn per_second(count: u32) -> Self {
        Self::new(count, 1.0)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.count == 0 {
            return Err(DomainError::Validation(
                "rate limit must allow at least one message".to_string(),
            ));
        }
        if !self.per_seconds.is_finite() || self.per_seconds <= 0.0 {
            return Err(DomainError::Validation(format!(
                "rate limit period must be a positive number of seconds, got {}",
                self.per_seconds
            )));
        }
        Duration::try_from_secs_f64(self.per_seconds / f64::from(self.count)).map_err(|err| {
            DomainError::Validation(format!(
                "rate limit period {}s is out of range: {err}",
                self.per_seconds
            ))
        })?;
        Ok(())
    }

    /// Messages per second.
    pub fn normalized(&self) -> f64 {
        f64::from(self.count) / self.per_seconds
    }

    /// Minimum spacing between two sends under this limit.
    /// Saturates at `Duration::MAX` for limits that did not pass [`Self::validate`].
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.per_seconds / f64::from(self.count))
            .unwrap_or(Duration::MAX)
    }
}

impl std::fmt::Display for RateSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}s", self.count, self.per_seconds)
    }
}

/// Parses `"<count>/<seconds>"`, e.g. `"30/1"`.
impl FromStr for RateSpec {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (count, per_seconds) = value
            .split_once('/')
            .ok_or_else(|| DomainError::Validation(format!("expected <count>/<seconds>, got {value:?}")))?;
        let count = count
            .trim()
            .parse::<u32>()
            .map_err(|_| DomainError::Validation(format!("invalid message count in {value:?}")))?;
        let per_seconds = per_seconds
            .trim()
            .trim_end_matches('s')
            .parse::<f64>()
            .map_err(|_| DomainError::Validation(format!("invalid period in {value:?}")))?;

        let spec = RateSpec::new(count, per_seconds);
        spec.validate()?;
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_count_and_period() {
        assert_eq!("30/1".parse::<RateSpec>().unwrap(), RateSpec::new(30, 1.0));
        assert_eq!(" 1 / 2.5s ".parse::<RateSpec>().unwrap(), RateSpec::new(1, 2.5));
    }

    #[test]
    fn rejects_malformed_specs() {
        assert!("30".parse::<RateSpec>().is_err());
        assert!("x/1".parse::<RateSpec>().is_err());
        assert!("0/1".parse::<RateSpec>().is_err());
        assert!("1/0".parse::<RateSpec>().is_err());
        assert!("1/-2".parse::<RateSpec>().is_err());
    }

    #[test]
    fn rejects_degenerate_limits() {
        assert!("1/1e20".parse::<RateSpec>().is_err());
        assert!(RateSpec::new(1, f64::MAX).validate().is_err());
        assert!(RateSpec::new(1, f64::INFINITY).validate().is_err());
        assert_eq!(RateSpec::new(1, 1e20).interval(), Duration::MAX);
    }

    #[test]
    fn interval_is_period_over_count() {
        assert_eq!(RateSpec::new(1, 2.0).interval(), Duration::from_secs(2));
        assert_eq!(RateSpec::new(4, 1.0).interval(), Duration::from_millis(250));
    }
}
