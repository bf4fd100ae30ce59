//! Treatment lifecycle: CRUD orchestration, ports, and dose
//! confirmation.

pub mod confirmation;
pub mod ports;
pub mod service;
