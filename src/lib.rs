//! Inspection/negotiation workflow core for a property marketplace.
//!
//! A multi-party state machine coordinating a buyer, a property owner
//! and an admin/field-agent through scheduling a property inspection
//! and negotiating its terms (price or a Letter of Intention).

pub mod case;
pub mod effects;
pub mod error;
pub mod machine;
pub mod outcome;
pub mod routing;
pub mod service;
pub mod store;
pub mod utils;
