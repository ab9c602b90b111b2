//! Track management module

pub mod manager;
pub mod sync;
pub mod track;

pub use manager::{aggregate, TrackManager};
pub use sync::{align, align_with, Alignment, SlotOffsets};
pub use track::{Track, TrackKey, TrackStats};
