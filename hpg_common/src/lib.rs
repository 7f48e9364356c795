mod secret;

pub mod helpers;

pub use helpers::{parse_list, parse_seconds, ValueParseError};
pub use secret::Secret;
