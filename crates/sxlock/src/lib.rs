//! sxlock - simple screen locker
//!
//! Command-line handling for the `sxlock` binary. The lock session itself
//! lives in `sxlock-core`; this crate wires it to the X11 and PAM backends.

pub mod cli;

pub use cli::Cli;
