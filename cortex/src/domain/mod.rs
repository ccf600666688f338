// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Health signals, reference data, privacy rules, events and configuration.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Value types shared by the application services

pub mod signal;
pub mod knowledge;
pub mod privacy;
pub mod events;
pub mod config;

pub use signal::*;
pub use knowledge::*;
pub use events::*;
pub use config::*;
