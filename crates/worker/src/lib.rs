// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ink-worker: the execution side of the build system.
//!
//! A worker long-polls the daemon for a claimable stage, accepts it,
//! fetches the full payload, and drives the stage's steps through an
//! execution hook while shipping live log lines back to the daemon.

pub mod client;
pub mod hook;
pub mod http;
pub mod mask;
pub mod runner;
pub mod spec;

pub use client::{Client, ClientError, ClientV1};
pub use hook::{Hook, HookError, StepState};
pub use http::HttpClient;
pub use mask::MaskWriter;
pub use runner::Runner;
pub use spec::{RuntimeStep, RuntimeWorkflow};
