//! HTTP front end for the audiograb pipeline.

pub mod api;
pub mod metrics;
pub mod state;
