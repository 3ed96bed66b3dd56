// Chat relay - multi-provider LLM chat backend
// Library exports

pub mod catalog; // Provider templates
pub mod config;
pub mod conversations;
pub mod credentials; // Per-user API keys
pub mod dispatch; // One chat turn end to end
pub mod errors;
pub mod providers; // Request building and response normalization
pub mod records;
pub mod server; // HTTP API
pub mod store; // JSON collection persistence

pub use dispatch::{DispatchRequest, Dispatcher};
pub use errors::{DispatchError, Result};
