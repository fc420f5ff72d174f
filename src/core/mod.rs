// Public modules
pub mod archive;
pub mod error;
pub mod git;
pub mod github;
pub mod identity;
pub mod keychain;
pub mod package;
pub mod project_config;
pub mod rewrite;
pub mod sf;
pub mod tokens;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
