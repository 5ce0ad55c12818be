pub mod appointment;
pub mod enums;
pub mod queue_entry;

pub use appointment::*;
pub use enums::*;
pub use queue_entry::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}
