//! Reusable widget components.

pub mod select;
pub mod status;

pub use select::{OptionList, SelectField};
pub use status::StatusLine;
