//! Signing
//!
//! Correlates a transaction's owned inputs with custodian signatures and
//! encodes them the way the transaction format expects.

mod collaborators;
mod der;
mod engine;

pub use collaborators::*;
pub use der::*;
pub use engine::*;
