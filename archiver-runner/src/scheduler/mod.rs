//! Scheduler layer
//!
//! [`FleetRunner`] performs one pass over every container; [`ArchiveService`]
//! repeats passes on a fixed interval until shut down.

pub mod fleet;
pub mod service;

pub use fleet::{ContainerReport, FleetReport, FleetRunner};
pub use service::ArchiveService;
