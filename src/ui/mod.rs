//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! Messages meant for the person running `ap` go through this module so
//! quiet and debug modes are honored in one place. Library diagnostics use
//! `tracing` instead.

pub mod output;
