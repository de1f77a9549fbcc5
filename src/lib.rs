//! `vss`: discovers annotated shell scripts, orders them by dependency, asks for the
//! values they need and runs the selection one script at a time.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
