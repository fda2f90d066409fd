#![no_std]

#[cfg(feature = "std")]
extern crate std;

// Satellite equipment control: configuration, cache, DiSEqC codec and the
// sequencing engine that drives LNB supply, tone, switches and positioners.
//
// The crate avoids the standard library so the same engine can run on a
// set-top box SoC or inside host tooling. Only the angular positioning
// trigonometry needs the `std` feature.

pub mod cancel;
pub mod commands;
pub mod config;
pub mod diseqc;
pub mod engine;
pub mod frontend;
pub mod positioner;
pub mod repl;
pub mod state;
pub mod telemetry;
pub mod timing;
