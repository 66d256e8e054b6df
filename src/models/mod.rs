//! Core data models.

#[cfg(test)]
pub(crate) mod fixtures;
mod identity;
mod ids;
mod match_record;
mod rank;
mod stats;

pub use identity::*;
pub use ids::*;
pub use match_record::*;
pub use rank::*;
pub use stats::*;
