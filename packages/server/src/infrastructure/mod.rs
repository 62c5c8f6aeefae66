//! Infrastructure layer: wire DTOs, storage adapters, and in-memory registries.

pub mod dto;
pub mod gateway;
pub mod registry;
