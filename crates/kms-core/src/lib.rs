//! Core types, access policy, and service layer for the KMS report tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies. Storage
//! backends implement [`store::TrackerStore`]; the presentation layer drives
//! every operation through [`tracker::Tracker`], which consults
//! [`policy`] before anything is written.

pub mod comment;
pub mod error;
pub mod module;
pub mod policy;
pub mod report;
pub mod store;
pub mod tracker;
pub mod user;

pub use error::{Denial, Error, ErrorKind, Result};
pub use tracker::Tracker;
