//! Pure feature extractors.
//!
//! - [`lexical`]: F1-F7 from the URL string alone
//! - [`document`]: F9-F15 and F17 from a fetched page
//! - [`registration`]: F8, F16 and F18 from a registration record

pub mod document;
pub mod lexical;
pub mod registration;
