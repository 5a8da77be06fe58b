//! End-to-end tests for the Lunaris runtime
//!
//! These tests run Lua source through a full [`lunaris_runtime::Script`]
//! session (core library included) and check the results.

mod harness;
mod basics;
mod control;
mod coroutines;
mod interop;
mod math;
mod modules;
mod strings;
mod tables;
