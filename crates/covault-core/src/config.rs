//! Session configuration

use crate::error::{AccessError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed configuration for one access session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Minimum count of distinct grantors (including the requester)
    /// required before the requester may open the document.
    pub threshold: u16,
    /// Number of registered participants.
    pub participants: u16,
    /// How long an opened document stays visible before the automatic
    /// local reset fires.
    pub open_window: Duration,
    /// How long a request may stay below threshold before the agent fails
    /// closed with a local reset.
    pub request_deadline: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            threshold: 2,
            participants: 3,
            open_window: Duration::from_secs(10),
            request_deadline: Duration::from_secs(15),
        }
    }
}

impl SessionConfig {
    /// Create a config with the given threshold and participant count.
    pub fn new(threshold: u16, participants: u16) -> Self {
        Self {
            threshold,
            participants,
            ..Self::default()
        }
    }

    /// Create a config with short timing windows for tests.
    pub fn for_testing(threshold: u16, participants: u16) -> Self {
        Self {
            threshold,
            participants,
            open_window: Duration::from_millis(100),
            request_deadline: Duration::from_millis(500),
        }
    }

    /// Validate `1 ≤ threshold ≤ participants`.
    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 {
            return Err(AccessError::invalid_config("threshold must be at least 1"));
        }
        if self.threshold > self.participants {
            return Err(AccessError::invalid_config(format!(
                "threshold {} exceeds participant count {}",
                self.threshold, self.participants
            )));
        }
        Ok(())
    }
}
