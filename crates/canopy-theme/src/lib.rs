//! Theme support for canopy syntax highlighting.
//!
//! This crate provides:
//! - Theme slots and the mapping from grammar token types onto them
//! - Built-in themes (`base`, `dark`, `light`, `monochrome`)
//! - CSS and ANSI output generation
//! - Theme parsing from Helix-style TOML files (feature `toml`)

pub mod highlights;
pub mod theme;

pub use highlights::{ThemeSlot, slot_for_class, slot_for_type, tag_for_class};
pub use theme::{Color, Modifiers, Style, Theme, ThemeError, builtin};
