//! Configuration for the quill editor: settings model, TOML files and
//! conversion into the load, save and backup configs of `quill_fs`.

pub mod config;
pub mod error;
pub mod settings;

pub use config::*;
pub use error::*;
pub use settings::*;
