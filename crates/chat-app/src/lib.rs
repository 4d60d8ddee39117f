//! Companion Chat: WASM entry point.
//!
//! This crate is the composition root (DI wiring layer).
//! It assembles the platform adapters, hands them to the session manager,
//! and exposes the result to the host page through wasm-bindgen.

mod app;
mod download;


pub use app::{create_app, pick_directory, ChatApp};

use wasm_bindgen::prelude::*;

/// WASM entry point: runs once when the module is instantiated
#[wasm_bindgen(start)]
pub fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Companion chat WASM starting...");
}
