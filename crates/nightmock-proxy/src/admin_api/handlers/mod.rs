//! Admin API endpoint handlers, grouped by resource.

pub mod recordings;
pub mod rules;
pub mod system;
