//! Execution modes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HearthError;

/// Which step sequence a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// House is being left: lights off, thermostat set back, etc.
    Vacation,
    /// House is being re-occupied
    Home,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Vacation => "vacation",
            Mode::Home => "home",
        }
    }

    /// Mode the UI should offer given the current away-mode flag
    ///
    /// Away already on means the house is empty, so the useful next step is coming home.
    pub fn suggested(away: bool) -> Self {
        if away {
            Mode::Home
        } else {
            Mode::Vacation
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = HearthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vacation" => Ok(Mode::Vacation),
            "home" => Ok(Mode::Home),
            _ => Err(HearthError::InvalidMode { mode: s.to_string() }),
        }
    }
}
