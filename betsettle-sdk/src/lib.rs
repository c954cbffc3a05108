//! Wire types for the bet settlement pipeline.
//!
//! Everything in here is shared between the settlement core, the HTTP
//! surface and downstream consumers of the settlement channel. No database
//! types live here; see `betsettle-core::entities` for those.

pub mod objects;
