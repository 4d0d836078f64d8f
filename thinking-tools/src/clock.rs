//! Wall-clock awareness
//!
//! Reports the current time in UTC and in one configured IANA time zone.
//! The same one-line summary is embedded in the tool description so hosts
//! that re-list tools see the time without calling anything.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{set_if, Env};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// IANA zone name, e.g. `America/Chicago`
    pub timezone: String,
    /// Free-form label shown next to the local time
    pub location: String,
    /// Seconds between `tools/list_changed` notifications
    pub refresh_secs: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            timezone: "America/Chicago".to_string(),
            location: "Kansas City, Kansas, USA".to_string(),
            refresh_secs: 60,
        }
    }
}

impl ClockConfig {
    pub fn apply_env(&mut self, env: &Env) {
        set_if(&mut self.timezone, env.get("MCP_CLOCK_TIMEZONE"));
        set_if(&mut self.location, env.get("MCP_CLOCK_LOCATION"));
        set_if(&mut self.refresh_secs, env.parse("MCP_CLOCK_REFRESH_SECS"));
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }
}

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("Unknown time zone '{0}'")]
    UnknownTimezone(String),
}

#[derive(Debug, Clone)]
pub struct Clock {
    tz: Tz,
    location: String,
}

impl Clock {
    pub fn new(config: &ClockConfig) -> Result<Self, ClockError> {
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|_| ClockError::UnknownTimezone(config.timezone.clone()))?;
        Ok(Self {
            tz,
            location: config.location.clone(),
        })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// `2024-03-10 18:04:05 UTC | 2024-03-10 01:04:05 PM CDT (Sunday)`
    pub fn summary(&self, now: DateTime<Utc>) -> String {
        let local = now.with_timezone(&self.tz);
        format!(
            "{} | {} ({})",
            now.format("%Y-%m-%d %H:%M:%S UTC"),
            local.format("%Y-%m-%d %I:%M:%S %p %Z"),
            local.format("%A")
        )
    }

    /// Description for `get_current_time`, refreshed on every listing.
    pub fn tool_description(&self, now: DateTime<Utc>) -> String {
        format!(
            "NOW: {} | {}. Call this tool for a formatted time response.",
            self.summary(now),
            self.location
        )
    }

    /// Markdown body returned by `get_current_time`.
    pub fn report(&self, now: DateTime<Utc>) -> String {
        let local = now.with_timezone(&self.tz);
        let label = self
            .location
            .split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Local");
        format!(
            "**Current Time:**\n\
             - UTC: {}\n\
             - {}: {} ({})\n\
             - Location: {}\n\
             - Unix Timestamp: {}\n\
             - ISO 8601: {}",
            now.format("%Y-%m-%d %H:%M:%S UTC"),
            label,
            local.format("%Y-%m-%d %I:%M:%S %p %Z"),
            local.format("%A"),
            self.location,
            now.timestamp(),
            now.to_rfc3339_opts(SecondsFormat::Micros, false)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 4, 17, 30, 0).unwrap()
    }

    #[test]
    fn test_summary_in_zone() {
        let clock = Clock::new(&ClockConfig::default()).unwrap();
        assert_eq!(
            clock.summary(at()),
            "2024-07-04 17:30:00 UTC | 2024-07-04 12:30:00 PM CDT (Thursday)"
        );
        assert!(clock
            .tool_description(at())
            .ends_with("Kansas City, Kansas, USA. Call this tool for a formatted time response."));
    }

    #[test]
    fn test_report_fields() {
        let clock = Clock::new(&ClockConfig {
            timezone: "Europe/Berlin".to_string(),
            location: "Berlin, Germany".to_string(),
            refresh_secs: 60,
        })
        .unwrap();
        let report = clock.report(at());
        assert!(report.contains("- Berlin: 2024-07-04 07:30:00 PM CEST (Thursday)"));
        assert!(report.contains("- Unix Timestamp: 1720114200"));
        assert!(report.contains("- ISO 8601: 2024-07-04T17:30:00.000000+00:00"));
    }

    #[test]
    fn test_unknown_zone_and_env() {
        let err = Clock::new(&ClockConfig {
            timezone: "Mars/Olympus".to_string(),
            ..ClockConfig::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus"));

        let mut config = ClockConfig::default();
        config.apply_env(&Env::from_pairs([
            ("MCP_CLOCK_TIMEZONE", "UTC"),
            ("MCP_CLOCK_REFRESH_SECS", "0"),
        ]));
        assert_eq!(config.timezone, "UTC");
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
    }
}
