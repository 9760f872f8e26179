//! Gate modes and the status display derived from them

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::error::Error;

/// Operating mode of a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Pass every data message through
    #[default]
    Open,
    /// Drop every data message
    Closed,
    /// Buffer data messages until drained
    Queueing,
}

impl Mode {
    /// Textual form used in configuration and persisted state
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Open => "open",
            Mode::Closed => "closed",
            Mode::Queueing => "queueing",
        }
    }

    /// Status display for this mode with `queue_len` buffered messages
    pub fn status(&self, queue_len: usize) -> Status {
        match self {
            Mode::Open => Status::new(Fill::Green, Shape::Dot, "open"),
            Mode::Closed => Status::new(Fill::Red, Shape::Ring, "closed"),
            Mode::Queueing => {
                Status::new(Fill::Yellow, Shape::Ring, format!("queuing: {}", queue_len))
            }
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Mode::Open),
            "closed" => Ok(Mode::Closed),
            "queueing" => Ok(Mode::Queueing),
            _ => Err(Error::InvalidMode(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Status indicator colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Fill {
    Green,
    Red,
    Yellow,
}

/// Status indicator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Dot,
    Ring,
}

/// Status display triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Status {
    pub fill: Fill,
    pub shape: Shape,
    pub text: String,
}

impl Status {
    pub fn new(fill: Fill, shape: Shape, text: impl Into<String>) -> Self {
        Self {
            fill,
            shape,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!("open".parse::<Mode>().unwrap(), Mode::Open);
        assert_eq!("CLOSED".parse::<Mode>().unwrap(), Mode::Closed);
        assert_eq!("Queueing".parse::<Mode>().unwrap(), Mode::Queueing);
        assert!(matches!("queuing".parse::<Mode>(), Err(Error::InvalidMode(_))));
    }

    #[test]
    fn test_mode_serde() {
        let mode: Mode = serde_json::from_str("\"QUEUEING\"").unwrap();
        assert_eq!(mode, Mode::Queueing);
        assert_eq!(serde_json::to_string(&Mode::Closed).unwrap(), "\"closed\"");
        assert!(serde_json::from_str::<Mode>("\"half-open\"").is_err());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Mode::Open.status(3), Status::new(Fill::Green, Shape::Dot, "open"));
        assert_eq!(Mode::Closed.status(0), Status::new(Fill::Red, Shape::Ring, "closed"));
        assert_eq!(Mode::Queueing.status(2).text, "queuing: 2");
        assert_eq!(Mode::Queueing.status(2).fill, Fill::Yellow);
    }
}
