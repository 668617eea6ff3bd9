pub mod client;
pub mod credentials;
pub mod json_parser;
pub mod prompts;
pub mod types;

pub use client::*;
pub use credentials::*;
pub use types::*;
