//! Job configuration: schema and layered loading

pub mod loader;
pub mod schema;

pub use loader::{merge_values, parse_layer, ConfigLoader, ENV_PREFIX};
pub use schema::{
    CategoryConfig, CheckpointConfig, ExecutionConfig, InputConfig, JobConfig, OutputConfig,
    RetryConfig, SamplingConfig, TargetConfig,
};
