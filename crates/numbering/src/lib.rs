//! Human-readable document numbers (`INV-2025-01-0043`).

pub mod sequence;
pub mod service;

pub use sequence::{NumberingPolicy, NumberingSequence};
pub use service::{NumberingConfig, NumberingService, SequenceConfig};
