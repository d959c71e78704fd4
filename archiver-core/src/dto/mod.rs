//! Data Transfer Objects for the remote archive API
//!
//! Lightweight request/response shapes exchanged with the archive service.

pub mod assignment;
