//! Navigation Manager: SPA-aware navigation, redirect-loop and
//! unexpected-page detection.

mod core;
mod types;

pub use core::NavigationManager;
pub use types::{NavigationResult, NavigationType, SpaConfig, WaitUntil};
