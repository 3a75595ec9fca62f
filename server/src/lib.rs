//! Authoritative game server library.
//!
//! The binary in `main.rs` wires these modules together; everything is also
//! exported here so integration tests and tooling can drive the subsystems
//! directly.

pub mod ai;
pub mod chat;
pub mod combat;
pub mod config;
pub mod context;
pub mod entities;
pub mod handlers;
pub mod inventory;
pub mod items;
pub mod map;
pub mod net;
pub mod pathfinding;
pub mod repository;
pub mod session;
pub mod spawn;
pub mod store;
pub mod tick;
pub mod visibility;
pub mod visual_registry;
