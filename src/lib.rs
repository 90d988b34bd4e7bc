//! battletui - turn-based battle client
//!
//! This library exposes the client's modules for testing.

pub mod action;
pub mod api;
pub mod config;
pub mod countdown;
pub mod effect;
pub mod model;
pub mod reducer;
pub mod selection;
pub mod state;
pub mod ui;
pub mod wire;
