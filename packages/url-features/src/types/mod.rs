//! Data types shared across the extraction pipeline.

pub mod config;
pub mod document;
pub mod feature;
pub mod registration;
