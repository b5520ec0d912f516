// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer (JSON files on local disk).

pub mod json_file;

pub use json_file::JsonFileError;

/// Default file names, relative to the working directory.
pub mod files {
    pub const TOKEN: &str = "token.json";
    pub const ACTIVITY_CACHE: &str = "activities.json";
}
