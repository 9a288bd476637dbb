//! # CEPS Testkit
//!
//! Testing utilities for CEPS:
//!
//! - **Fixtures**: in-memory hosts on a shared network, with seeding
//!   shortcuts for contacts, groups, and grants.
//! - **Generators**: proptest strategies for property-based testing.
//!
//! ## Fixtures
//!
//! ```rust,ignore
//! use ceps_testkit::fixtures::two_hosts;
//!
//! let (_network, a, b) = two_hosts().await;
//! let cred = a.node.login(&UserId::new("alice"), true).await?;
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{init_tracing, messaging_grant, two_hosts, TestHost};
