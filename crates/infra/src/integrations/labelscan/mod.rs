//! Medication label scanning via a vision model.
//!
//! The client sends a photo of a prescription or medication box to the
//! generateContent endpoint and parses the structured candidates the
//! model returns. A single image may yield several medications.

pub mod client;
pub mod types;

pub use client::{LabelScanClient, LabelScanConfig};
pub use types::LabelScanError;
