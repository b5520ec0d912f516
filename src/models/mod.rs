// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod credential;
pub mod report;

pub use activity::ActivityRecord;
pub use credential::Credential;
pub use report::{GearUsage, WeeklySummary};
