//! External service integrations

pub mod labelscan;
