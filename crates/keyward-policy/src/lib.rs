// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rotation and expiry policy engine for keyward.
//!
//! [`RotationPolicy`] decides per credential, [`PolicyEngine`] applies the
//! decision across the store, and [`RotationScheduler`] runs the engine on a
//! period with at most one scan in flight.

pub mod engine;
pub mod notifier;
pub mod policy;
pub mod scheduler;

pub use engine::{DEFAULT_CONCURRENCY, PolicyEngine, ScanReport};
pub use notifier::LogNotifier;
pub use policy::{RotationPolicy, Verdict};
pub use scheduler::RotationScheduler;
