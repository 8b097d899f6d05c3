#![no_std]

// Shared logic for the DRV8243 controller feature set.
//
// This crate stays portable across MCU firmware and host tooling by avoiding
// the Rust standard library and exposing trait seams the other crates adopt.

pub mod driver;
pub mod handshake;
pub mod level;
pub mod lines;
pub mod telemetry;
