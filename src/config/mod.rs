//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → CLI flag overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → MarketConfig (validated, immutable)
//!     → passed by reference to every module's configure function
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; modules never mutate it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod overrides;
pub mod schema;
pub mod validation;

pub use overrides::Overrides;
pub use loader::{load_config, parse_config, parse_str, ConfigError};
pub use schema::{
    ApiConfig, AuthConfig, EndpointConfig, FsStoreConfig, JournalConfig, LifecycleConfig, LogFormat,
    MarketConfig, MinerConfig, ObservabilityConfig, RunMode, StaticToken,
};
pub use validation::{validate_config, ValidationError};
