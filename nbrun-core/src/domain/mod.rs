//! Core domain types
//!
//! These types describe notebook runs as the tracker sees them. They are
//! derived from the processing service's job descriptions and shared between
//! the tracker (which maintains them) and the CLI (which renders them).

pub mod failure;
pub mod naming;
pub mod run;
