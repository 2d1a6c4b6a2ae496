//! Command implementations for the kbprep CLI
//!
//! Each command has its own module with its argument struct and a `run`
//! function.

pub mod candidates;
pub mod config;
pub mod filter;
pub mod info;
pub mod tag;
pub mod validate;

pub use candidates::CandidatesArgs;
pub use config::ConfigArgs;
pub use filter::FilterArgs;
pub use info::InfoArgs;
pub use tag::TagArgs;
pub use validate::ValidateArgs;
