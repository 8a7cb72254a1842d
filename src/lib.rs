//! moviefind library
//!
//! Exposes the response cache, the OMDb client and the search controller for
//! the binary and for integration tests.

pub mod cache;
pub mod cli;
pub mod controller;
pub mod data;
