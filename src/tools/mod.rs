//! Tool Registry (§4.8). `tool.rs` carries over the teacher's `Tool`
//! value and schema normalizer unchanged; `registry.rs` wraps it with
//! registry-only metadata (enabled flag, category, origin) and the
//! lock-free enable/disable snapshot swap.

pub mod calculator;
pub mod registry;
pub mod tool;

pub use registry::{ToolRegistry, ToolSnapshot};
pub use tool::{convert_schema_to_openai, Tool, ToolHandler};
