// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity_cache;
pub mod strava;
pub mod sync;
pub mod token_store;

pub use activity_cache::{ActivityCache, MergeOutcome};
pub use strava::{StravaApi, StravaClient, StravaError};
pub use sync::{ActivitySync, SyncReport};
pub use token_store::{TokenStatus, TokenStore};
