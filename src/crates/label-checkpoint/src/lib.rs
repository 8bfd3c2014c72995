//! Durable checkpoints for long-running labeling jobs.
//!
//! A job periodically saves a [`Checkpoint`]: its state plus the fingerprint
//! of the configuration that produced it. On restart, [`load_compatible`]
//! decides whether the saved state can be resumed; unreadable, corrupt or
//! mismatched checkpoints are reported, never fatal.
//!
//! # Stores
//!
//! - [`JsonFileStore`] - pretty JSON file with atomic temp-file-and-rename writes
//! - [`InMemoryStore`] - process-local store for tests
//!
//! # Example
//!
//! ```rust,ignore
//! use label_checkpoint::{load_compatible, Checkpoint, CheckpointStore, JsonFileStore, LoadOutcome};
//!
//! let store = JsonFileStore::new(".labeler/checkpoint.json");
//! match load_compatible(&store, &fingerprint).await {
//!     LoadOutcome::Compatible(checkpoint) => resume(checkpoint.state),
//!     other => start_fresh(other),
//! }
//! store.save(&Checkpoint::new(fingerprint, state)).await?;
//! ```

pub mod checkpoint;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use checkpoint::{Checkpoint, ValidateState, FORMAT_VERSION};
pub use error::{CheckpointError, Result};
pub use file::{write_atomic, JsonFileStore};
pub use memory::InMemoryStore;
pub use traits::{load_compatible, CheckpointStore, LoadOutcome};
