//! Configuration helpers
//!
//! Environment variable loading used to layer `PREFIX_*` overrides on top of
//! file-based configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! use tooling::config::{build_env_key, get_env_parse};
//!
//! let key = build_env_key("LABELER_", "concurrency");
//! if let Some(n) = get_env_parse::<usize>(&key)? {
//!     config.concurrency = n;
//! }
//! ```

mod env;

pub use env::{build_env_key, get_env, get_env_bool, get_env_parse};
