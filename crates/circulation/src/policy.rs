//! Circulation policy (loan period, renewal ceiling, fine rate).

use chrono::Duration;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOAN_DAYS: u32 = 14;
pub const DEFAULT_MAX_RENEWS: u32 = 2;
pub const DEFAULT_FINE_PER_DAY: u64 = 1;

pub const LOAN_DAYS_ENV: &str = "LIBCIRC_LOAN_DAYS";
pub const MAX_RENEWS_ENV: &str = "LIBCIRC_MAX_RENEWS";
pub const FINE_PER_DAY_ENV: &str = "LIBCIRC_FINE_PER_DAY";

/// Rules injected into the engine at construction and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CirculationPolicy {
    /// Length of a loan period; also the extension granted by each renewal.
    pub loan_days: u32,
    pub max_renews: u32,
    /// Fine units charged per whole day overdue.
    pub fine_per_day: u64,
}

impl Default for CirculationPolicy {
    fn default() -> Self {
        Self {
            loan_days: DEFAULT_LOAN_DAYS,
            max_renews: DEFAULT_MAX_RENEWS,
            fine_per_day: DEFAULT_FINE_PER_DAY,
        }
    }
}

impl CirculationPolicy {
    /// Read the policy from `LIBCIRC_*` environment variables.
    ///
    /// Missing variables use the defaults; unparsable ones are logged and
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            loan_days: parse_or(&lookup, LOAN_DAYS_ENV, defaults.loan_days),
            max_renews: parse_or(&lookup, MAX_RENEWS_ENV, defaults.max_renews),
            fine_per_day: parse_or(&lookup, FINE_PER_DAY_ENV, defaults.fine_per_day),
        }
    }

    pub fn loan_period(&self) -> Duration {
        Duration::days(i64::from(self.loan_days))
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: core::str::FromStr + core::fmt::Display + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, default = %default, "unparsable policy value; using default");
                default
            }
        },
    }
}
