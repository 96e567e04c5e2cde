//! Selection controls over reference collections.
//!
//! - [`guard`]: reconciles a held value with the current options.
//! - [`renderer`]: filters and batches large option lists.
//! - [`control`]: ties both to one collection key for the console.

pub mod control;
pub mod guard;
pub mod renderer;

pub use control::{ControlView, SelectionControl};
pub use guard::{
    find_option, resolve_many, resolve_selection, RenderableSelection, RenderableValue,
    SelectionCandidate,
};
pub use renderer::{filter_options, IncrementalOptionRenderer, RendererConfig, ScrollPosition};
