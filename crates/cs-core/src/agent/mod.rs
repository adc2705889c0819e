//! Per-page ad-skip automation
//!
//! The agent is split so the transition logic never sees the DOM:
//! observations arrive as booleans, become edges in [`EdgeDetector`], and
//! drive [`AdSkipAgent`]. The page is reached only through the
//! [`PlayerSurface`] and [`Scheduler`] seams.

mod cosmetic;
mod edge;
mod machine;
mod surface;
mod watcher;

pub use cosmetic::*;
pub use edge::*;
pub use machine::*;
pub use surface::*;
pub use watcher::*;
