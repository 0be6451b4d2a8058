//! mergescore library
//!
//! This module exports the core functionality of mergescore for use in
//! integration tests and as a library: the fingerprinter, the response cache,
//! the result store and the pipeline that ties them to a repository and a
//! scorer.

pub mod authors;
pub mod cache;
pub mod config;
pub mod db;
pub mod fingerprint;
pub mod migrations;
pub mod pipeline;
pub mod prepare;
pub mod since;
pub mod store;
