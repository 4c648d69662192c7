//! Domain layer: entities, value objects, and the ports the application
//! services depend on.
//!
//! Everything here is framework-free. The state-transition table in
//! [`application`] and the pure fraud heuristics in [`fraud`] carry the core
//! business rules; [`ports`] defines the store, gateway, and clock traits
//! the infrastructure layer implements.

pub mod application;
pub mod disbursement;
pub mod fee;
pub mod fraud;
pub mod money;
pub mod payment;
pub mod ports;
