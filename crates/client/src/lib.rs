//! Transport and configuration for the tally CLI.
//!
//! [`ServiceClient`] talks GraphQL to the finance service (or to on-disk
//! fixtures) and implements the engine's capability traits; nothing in the
//! mutation engine knows which mode is active.

mod client;
mod config;
mod error;
mod fixtures;
mod ids;
mod ops;
mod types;
mod wire;

pub use client::{ClientMode, ServiceClient};
pub use config::{
    default_config_path, default_journal_path, default_token_path, load_token, save_token, Config,
    ConfigError, DEFAULT_BASE_URL,
};
pub use error::TransportError;
pub use fixtures::FixtureStore;
pub use ids::{CategoryId, RecurringId, TagId, TransactionId, TypedId};
pub use types::{Category, Recurring, Tag, Transaction};
pub use wire::{from_wire, to_wire};
