//! Data models for the Young Lists application.
//!
//! Field names serialize in camelCase to match the web client's document shapes.

mod access;
mod history;
mod item;
mod list;
mod revision;
mod store;
mod template;

pub use access::*;
pub use history::*;
pub use item::*;
pub use list::*;
pub use revision::*;
pub use store::*;
pub use template::*;
