//! Flashback: show data as it was some minutes ago

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};

/// Flashback setting of a report. `Off` travels as the literal `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "FlashbackRepr", into = "FlashbackRepr")]
pub enum Flashback {
    #[default]
    Off,
    Window { mins_ago: u32, is_enabled: bool },
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FlashbackRepr {
    Flag(bool),
    Window {
        #[serde(rename = "minsAgo")]
        mins_ago: u32,
        #[serde(rename = "isEnabled", default)]
        is_enabled: bool,
    },
}

impl From<FlashbackRepr> for Flashback {
    fn from(repr: FlashbackRepr) -> Self {
        match repr {
            FlashbackRepr::Flag(_) => Flashback::Off,
            FlashbackRepr::Window { mins_ago, is_enabled } => Flashback::Window { mins_ago, is_enabled },
        }
    }
}

impl From<Flashback> for FlashbackRepr {
    fn from(flashback: Flashback) -> Self {
        match flashback {
            Flashback::Off => FlashbackRepr::Flag(false),
            Flashback::Window { mins_ago, is_enabled } => FlashbackRepr::Window { mins_ago, is_enabled },
        }
    }
}

impl Flashback {
    pub fn minutes(mins_ago: u32) -> Self {
        Flashback::Window {
            mins_ago,
            is_enabled: true,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Flashback::Window { is_enabled: true, .. })
    }

    /// Point in time the data should reflect, if flashback is active
    pub fn as_of(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Flashback::Window {
                mins_ago,
                is_enabled: true,
            } => Some(now - Duration::minutes(i64::from(*mins_ago))),
            _ => None,
        }
    }

    pub fn validate(&self) -> GridResult<()> {
        match self {
            Flashback::Window { mins_ago: 0, .. } => {
                Err(GridError::Validation("flashback needs at least one minute".into()))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_forms() {
        assert_eq!(serde_json::to_value(Flashback::Off).unwrap(), json!(false));
        assert_eq!(
            serde_json::to_value(Flashback::minutes(15)).unwrap(),
            json!({"minsAgo": 15, "isEnabled": true})
        );
        let parsed: Flashback = serde_json::from_value(json!({"minsAgo": 5})).unwrap();
        assert_eq!(
            parsed,
            Flashback::Window {
                mins_ago: 5,
                is_enabled: false
            }
        );
        let off: Flashback = serde_json::from_value(json!(false)).unwrap();
        assert_eq!(off, Flashback::Off);
    }

    #[test]
    fn test_as_of() {
        let now = Utc::now();
        assert_eq!(Flashback::minutes(10).as_of(now), Some(now - Duration::minutes(10)));
        assert_eq!(Flashback::Off.as_of(now), None);
        let disabled = Flashback::Window {
            mins_ago: 10,
            is_enabled: false,
        };
        assert_eq!(disabled.as_of(now), None);
    }
}
