//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → AgentConfig (validated, immutable)
//!     → sections handed to the subsystems that need them
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults matching the mainnet endpoints, so no file is required
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::AgentConfig;
pub use schema::MonitorConfig;
pub use schema::NetworkConfig;
pub use schema::ObservabilityConfig;
pub use schema::WithdrawalConfig;
