//! sxlock X11 backend
//!
//! Implements the display collaborator of the lock session on top of
//! `x11rb`: an override-redirect window covering the screen, pointer and
//! keyboard grabs, core-font text, DPMS power management and RandR output
//! selection.

pub mod display;
pub mod error;
pub mod geometry;
pub mod keymap;
pub mod layout;
pub mod rescue;

pub use display::X11Display;
pub use error::{Result, X11Error};
pub use geometry::{select_output, OutputCandidate, OutputGeometry};
pub use keymap::Keymap;
pub use layout::TextLayout;
pub use rescue::DpmsRescue;
