// src/core/mod.rs

pub mod annotations;
pub mod orchestrator;
pub mod parameters;
pub mod paths;
pub mod repository;
pub mod resolver;
pub mod selection;
pub mod store;
