//! Rights resolver for CEPS.
//!
//! The decision procedure that turns (actor, owner, table, grants) into
//! a concrete capability set: ordered system rules first, then additive
//! grant scanning. Everything fails closed.

pub mod capability;
pub mod error;
pub mod resolver;
pub mod rules;

pub use capability::CapabilitySet;
pub use error::{Result, RightsError};
pub use resolver::{RightsRequest, RightsResolver};
