//! End-to-end tests for the Cinder compiler
//!
//! These tests compile Cinder source and execute it on the reference
//! interpreter in [`harness`], checking module globals afterwards. Most
//! programs run twice, with and without the optimizer, and must agree.

mod harness;
mod control_flow;
mod exceptions;
mod functions;
mod modules;
mod objects;

pub use harness::*;
