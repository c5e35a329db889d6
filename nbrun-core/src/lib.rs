//! nbrun Core
//!
//! Core types shared by the nbrun client, tracker and CLI.
//!
//! This crate contains:
//! - Domain types: run descriptors, statuses, job naming rules, failure classification
//! - DTOs: wire types exchanged with the remote processing service

pub mod domain;
pub mod dto;
