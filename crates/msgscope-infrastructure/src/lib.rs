pub mod config_service;
pub mod json_codec;
pub mod memory_store;
pub mod toml_architecture;

pub use crate::config_service::{default_config_path, load_config, load_config_or_default};
pub use crate::json_codec::JsonCodec;
pub use crate::memory_store::MemoryStore;
pub use crate::toml_architecture::StaticArchitecture;
