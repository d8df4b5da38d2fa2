//! Domain layer for the event-sourcing core.
//!
//! This crate provides:
//! - [`AggregateRoot`] with strict per-root sequencing of uncommitted events
//! - [`Entity`], schema-driven state rebuilt by replaying event payloads
//! - [`EntitySchema`] as the opaque contract with the schema layer
//! - [`Command`] plus [`CommandDispatcher`] with three-tier handler
//!   resolution, concurrent fan-out, and panic isolation
//! - default create/update/delete handlers wiring it all to the store

pub mod aggregate;
pub mod command;
pub mod dispatcher;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod schema;

pub use aggregate::AggregateRoot;
pub use command::{Command, CommandMetadata};
pub use dispatcher::{CommandDispatcher, CommandHandler, Container, WILDCARD, handler_fn};
pub use entity::Entity;
pub use error::DomainError;
pub use handlers::{create_handler, delete_handler, register_defaults, update_handler};
pub use schema::{EntitySchema, FieldSchema};
