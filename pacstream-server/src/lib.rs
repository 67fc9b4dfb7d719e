//! # pacstream-server — Pac-Man session server
//!
//! Accepts game clients over TCP, authenticates them against a
//! preloaded credential table, runs one Pac-Man board per player while
//! streaming JPEG frames of it, and appends every finished game to the
//! results file.
//!
//! The protocol and session engine live in `pacstream-core`; this crate
//! wires it to configuration, the reference board and the acceptor.

pub mod board;
pub mod config;
pub mod credentials;
pub mod service;
