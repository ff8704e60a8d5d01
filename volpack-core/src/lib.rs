pub mod command;
pub mod compressor;
pub mod digest;
pub mod error;
pub mod localize;
pub mod manifest;
pub mod pipeline;
pub mod script;
pub mod template;
pub mod tool;
pub mod verify;
pub mod volume;

pub use error::{PackError, Result};
