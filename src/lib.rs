//! Three-panel slanted thumbnail composer.
//!
//! The canvas is split into three slots by two slanted dividers. Each slot
//! shows one image, cropped to cover its region, which the user can pan and
//! zoom independently. The composite can be exported as a PNG.

pub mod app;
pub mod catalog;
pub mod cli;
pub mod compositor;
pub mod config;
pub mod drop;
pub mod error;
pub mod geometry;
pub mod interaction;
pub mod loader;
pub mod logging;
pub mod search;
pub mod selection;
pub mod slot;
pub mod source;
pub mod text;
pub mod viewport;
