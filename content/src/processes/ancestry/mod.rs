//!
//! Top-down ancestry recording and its bottom-up verification.
//!
//! The recorder walks each committed session from its root and writes one record per leaf.
//! The verifier later re-derives every recorded chain through parent links only, so a clean
//! report proves both traversal directions agree.
//!

pub mod record;
pub mod recorder;
pub mod symmetry;
pub mod verifier;
