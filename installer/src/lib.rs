//! rd deployment library.
//!
//! Builds the rd binary with cargo and places the runtime files it needs next
//! to it under a single installation root. Used by the `rd-deploy` binary and
//! usable programmatically for tests or custom deployment workflows.
//!
//! # Modules
//!
//! - [`builder`] - Primary build delegation through `cargo install`
//! - [`cli`] - Command-line argument definitions
//! - [`compare`] - Freshness checks between build output and deployed files
//! - [`deployer`] - Manifest-driven copying with atomic replacement
//! - [`error`] - Per-step error types and exit codes
//! - [`executor`] - External command execution
//! - [`locate`] - Package root and build output discovery
//! - [`manifest`] - The static list of runtime artefacts
//! - [`pipeline`] - Deployment orchestration and dry-run planning
//! - [`progress`] - User-facing progress reporting
//! - [`status`] - Read-only inspection of an installation root
//! - [`target`] - Installation root validation and provisioning

pub mod builder;
pub mod cli;
pub mod compare;
pub mod deployer;
pub mod error;
pub mod executor;
pub mod locate;
pub mod manifest;
pub mod pipeline;
pub mod progress;
pub mod status;
pub mod target;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
