//! Rendering and parsing helpers for generated Falco types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::output;
use crate::schema::{Priority, Source};

/// Returned when a string does not name a Falco priority.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown priority '{0}'")]
pub struct ParsePriorityError(pub String);

impl Priority {
    /// Falco's own spelling of the priority, as printed in rule outputs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Emergency => "Emergency",
            Self::Alert => "Alert",
            Self::Critical => "Critical",
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Notice => "Notice",
            Self::Informational => "Informational",
            Self::Debug => "Debug",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Priority {
    type Err = ParsePriorityError;

    /// Case-insensitive. Accepts `info` as Falco's rules files do.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emergency" => Ok(Self::Emergency),
            "alert" => Ok(Self::Alert),
            "critical" => Ok(Self::Critical),
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            "notice" => Ok(Self::Notice),
            "informational" | "info" => Ok(Self::Informational),
            "debug" => Ok(Self::Debug),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syscall => f.write_str("syscall"),
            Self::K8sAudit => f.write_str("k8s_audit"),
        }
    }
}

impl output::Response {
    /// Event time as a UTC timestamp.
    ///
    /// `None` when the daemon omitted the time or sent an out-of-range value.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let time = self.time.as_ref()?;
        let nanos = u32::try_from(time.nanos).ok()?;
        DateTime::from_timestamp(time.seconds, nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_round_trips_through_label() {
        for priority in [
            Priority::Emergency,
            Priority::Alert,
            Priority::Critical,
            Priority::Error,
            Priority::Warning,
            Priority::Notice,
            Priority::Informational,
            Priority::Debug,
        ] {
            assert_eq!(priority.to_string().parse::<Priority>(), Ok(priority));
        }
    }

    #[test]
    fn test_priority_displays_capitalized_label() {
        assert_eq!(Priority::Warning.to_string(), "Warning");
        assert_eq!(Priority::Informational.to_string(), "Informational");
        assert_eq!(Priority::Emergency.label(), "Emergency");
    }

    #[test]
    fn test_priority_parse_accepts_info_alias() {
        assert_eq!("INFO".parse::<Priority>(), Ok(Priority::Informational));
        assert_eq!(" warning ".parse::<Priority>(), Ok(Priority::Warning));
    }

    #[test]
    fn test_priority_parse_rejects_unknown() {
        let err = "loud".parse::<Priority>().unwrap_err();
        assert_eq!(err.to_string(), "unknown priority 'loud'");
    }

    #[test]
    fn test_priority_from_wire_value() {
        let response = output::Response {
            priority: Priority::Critical as i32,
            ..Default::default()
        };
        assert_eq!(response.priority(), Priority::Critical);
    }

    #[test]
    fn test_source_display() {
        assert_eq!(Source::Syscall.to_string(), "syscall");
        assert_eq!(Source::K8sAudit.to_string(), "k8s_audit");
    }

    #[test]
    fn test_response_timestamp() {
        let response = output::Response {
            time: Some(prost_types::Timestamp {
                seconds: 1_600_000_000,
                nanos: 500,
            }),
            ..Default::default()
        };
        let ts = response.timestamp().unwrap();
        assert_eq!(ts.timestamp(), 1_600_000_000);
        assert_eq!(ts.timestamp_subsec_nanos(), 500);
    }

    #[test]
    fn test_response_timestamp_missing_or_invalid() {
        assert!(output::Response::default().timestamp().is_none());

        let response = output::Response {
            time: Some(prost_types::Timestamp {
                seconds: 0,
                nanos: -1,
            }),
            ..Default::default()
        };
        assert!(response.timestamp().is_none());
    }
}
