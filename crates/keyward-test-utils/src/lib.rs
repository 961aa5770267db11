// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for keyward integration tests.
//!
//! Provides in-memory test doubles for fast, deterministic tests without a
//! database.
//!
//! # Components
//!
//! - [`MemoryStore`] - `CredentialStore` with failure injection and a listing delay
//! - [`RecordingNotifier`] - `RotationNotifier` that captures every notice
//! - [`fixture_record`] - a credential record with dummy sealed bytes

pub mod memory_store;
pub mod recording_notifier;

pub use memory_store::{fixture_record, MemoryStore};
pub use recording_notifier::RecordingNotifier;
