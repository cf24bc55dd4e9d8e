//!
//! Bidirectional content hierarchy for forensic disk-image analysis.
//!
//! Every artifact recovered from an image is a [`ContentNode`](model::content::ContentNode) with a stable
//! [`ContentId`](model::content::ContentId). The [`TreeBuilder`](pipeline::builder::TreeBuilder) materializes
//! the hierarchy top-down, the [`AncestryRecorder`](processes::ancestry::recorder::AncestryRecorder) captures
//! the top-down view as a record file, and the [`ConsistencyVerifier`](processes::ancestry::verifier::ConsistencyVerifier)
//! proves that parent links reconstruct exactly the same ancestry bottom-up.
//!

pub mod config;
pub mod model;
pub mod pipeline;
pub mod processes;
pub mod test_helpers;
