//! Admission control for pipeline jobs.
//!
//! The [`AdmissionGate`] bounds how many jobs may be in flight on one host.
//! Admission is non-blocking: when every slot is taken the caller gets a
//! negative answer immediately and is expected to refuse the request with a
//! "busy" response rather than queue it.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use audiograb_core::admission::AdmissionGate;
//!
//! let gate = Arc::new(AdmissionGate::new(2));
//!
//! let first = gate.try_admit().expect("slot available");
//! let second = gate.try_admit().expect("slot available");
//! assert!(gate.try_admit().is_none());
//!
//! drop(first);
//! assert_eq!(gate.occupancy(), 1);
//! ```

mod gate;

pub use gate::{AdmissionGate, AdmissionToken, GateStatus};
