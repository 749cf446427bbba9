//! Town management for Plaza.
//!
//! A town is a shared virtual space. Its [`TownController`] owns who is
//! in it, issues sessions, provisions the town's shared channels exactly
//! once, tracks private channels, and tells [`TownListener`]s about
//! everything that happens.
//!
//! # Key types
//!
//! - [`TownController`]: authoritative state of one town
//! - [`TownRegistry`]: creates, lists, updates and deletes towns
//! - [`TownListener`] / [`ForwardingListener`]: event subscribers
//! - [`TownConfig`]: capacity, well-known id, teardown policy

mod config;
mod controller;
mod error;
mod listener;
mod private;
mod registry;

pub use config::{DEFAULT_CAPACITY, TownConfig, generate_town_id, generate_update_password};
pub use controller::{Departure, SharedChannels, TownController};
pub use error::TownError;
pub use listener::{EventReceiver, ForwardingListener, ListenerTarget, TownListener};
pub use registry::TownRegistry;
