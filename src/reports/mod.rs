//! Report rendering.
//!
//! The engine's contract is the ordered sequence of aggregates; rendering is
//! the collaborator's concern and lives here.

pub mod console;

pub use console::generate as generate_console;
