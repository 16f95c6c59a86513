pub mod api;
pub mod comment;
pub mod config;
pub mod countdown;
pub mod editors;
pub mod error;
pub mod messages;
pub mod model;
pub mod panel;
pub mod text_sanitize;
pub mod ui;
pub mod worker;
pub mod workflow;

pub use error::{Error, Result};
