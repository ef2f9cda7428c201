//! Domain list ingestion.
//!
//! Raw list text is normalized into [`DomainSet`]s, the unit every later
//! stage works with.

pub mod builtin;
mod domain_set;
mod normalize;

pub use domain_set::DomainSet;
pub use normalize::{ListScan, canonicalize_line, is_valid_hostname, normalize, scan};
