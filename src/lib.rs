//! stockscope — risk, technical-signal and warrant analytics over daily price series.
//!
//! Hexagonal architecture: pure engines in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], wiring in [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
