//! Domain model and collaborator interfaces for msgscope.
//!
//! # Module Structure
//!
//! - `record`: `RecordId`, `RecordRange`, `RawRecord`, `LogEntry`
//! - `session`: `Session`, `SessionStatus`, `StatusUpdate`
//! - `architecture`: `Port`, `Component`, `ArchitectureLookup`
//! - `msg`: the reconstructed domain message `Msg` and `Injection`
//! - `codec`: `PayloadCodec`
//! - `store`: `LogStore`, `KeyValueStore`, `PubSub`
//! - `keys`: store key naming
//! - `config`: `ScopeConfig`

pub mod architecture;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod msg;
pub mod record;
pub mod session;
pub mod store;

pub use architecture::{ArchitectureLookup, Component, Port};
pub use codec::PayloadCodec;
pub use config::{CacheConfig, KeyConfig, ScopeConfig, StreamConfig, TimestampMode};
pub use error::{Result, ScopeError};
pub use msg::{Injection, Msg};
pub use record::{LogEntry, RawRecord, RecordBound, RecordId, RecordRange};
pub use session::{Session, SessionStatus, StatusUpdate};
pub use store::{KeyValueStore, LogStore, PubSub, ReadOrder};
