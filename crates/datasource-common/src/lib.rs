//! Common utilities for datasource
//!
//! This crate provides the error taxonomy shared by the datasource crates.

pub mod error;

pub use error::{DatasourceError, Result};
