// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error sentinels shared across the API boundary.
//!
//! The string form of each sentinel is the wire contract: servers answer
//! error bodies as a single quoted JSON string, and clients map the body
//! back onto the typed variant with [`Error::from_sentinel`].

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("no record")]
    NoRecord,

    #[error("already exists")]
    AlreadyExists,

    #[error("already done")]
    AlreadyDone,

    #[error("canceled")]
    Canceled,

    #[error("context canceled")]
    ContextCanceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Rejected input: bad selector, missing resource field, dependency cycle.
    #[error("{0}")]
    Invalid(String),

    /// Database, filesystem or other internal failure.
    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::Invalid(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Map a wire error body back onto its typed sentinel, if it is one.
    pub fn from_sentinel(msg: &str) -> Option<Self> {
        match msg {
            "no record" => Some(Error::NoRecord),
            "already exists" => Some(Error::AlreadyExists),
            "already done" => Some(Error::AlreadyDone),
            "canceled" => Some(Error::Canceled),
            "context canceled" => Some(Error::ContextCanceled),
            "context deadline exceeded" => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_round_trip_through_their_display_form() {
        for err in [
            Error::NoRecord,
            Error::AlreadyExists,
            Error::AlreadyDone,
            Error::Canceled,
            Error::ContextCanceled,
            Error::DeadlineExceeded,
        ] {
            assert_eq!(Error::from_sentinel(&err.to_string()), Some(err));
        }
    }

    #[test]
    fn unknown_bodies_do_not_map() {
        assert_eq!(Error::from_sentinel("disk on fire"), None);
    }
}
