//! Public facade crate for `wordpipe`.
//!
//! This crate contains no IO or backend-specific logic.
//! It re-exports the backend-agnostic types/traits from `wordpipe-core`.

pub use wordpipe_core::*;
