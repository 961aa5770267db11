// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces the keyward core consumes from its collaborators.
//!
//! Both traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod notifier;
pub mod store;

pub use notifier::RotationNotifier;
pub use store::CredentialStore;
