// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle phase of builds, stages and steps.

use serde::{Deserialize, Serialize};

/// Phase moves monotonically through
/// `Waiting → Pending → Running → {Succeeded, Failed, Canceled, Skipped}`.
///
/// `Waiting` means blocked on `depends_on`; skip transitions are allowed
/// from `Waiting` or `Pending` only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Unknown,
    Waiting,
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Skipped,
}

crate::simple_display! {
    Phase {
        Unknown => "Unknown",
        Waiting => "Waiting",
        Pending => "Pending",
        Running => "Running",
        Succeeded => "Succeeded",
        Failed => "Failed",
        Canceled => "Canceled",
        Skipped => "Skipped",
    }
}

impl Phase {
    /// A done phase is terminal: the entity will never run again.
    pub fn is_done(self) -> bool {
        !matches!(self, Phase::Unknown | Phase::Waiting | Phase::Pending | Phase::Running)
    }

    pub fn is_succeeded(self) -> bool {
        self == Phase::Succeeded
    }

    pub fn is_failed(self) -> bool {
        self == Phase::Failed
    }
}

impl std::str::FromStr for Phase {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Waiting" => Phase::Waiting,
            "Pending" => Phase::Pending,
            "Running" => Phase::Running,
            "Succeeded" => Phase::Succeeded,
            "Failed" => Phase::Failed,
            "Canceled" => Phase::Canceled,
            "Skipped" => Phase::Skipped,
            _ => Phase::Unknown,
        })
    }
}

#[cfg(test)]
#[path = "phase_tests.rs"]
mod tests;
