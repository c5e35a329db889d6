//! Data Transfer Objects for the remote processing service
//!
//! Field names follow the service's PascalCase JSON shapes so the DTOs can be
//! sent and received without intermediate mapping.

pub mod job;
