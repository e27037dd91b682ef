//! Request handlers for the key-value API.

mod items;

pub use items::*;
