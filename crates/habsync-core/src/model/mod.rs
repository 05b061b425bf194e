// ── Domain model ──
//
// Canonical representation of openHAB items and the change notifications
// emitted for them. Built from `habsync_api` descriptors in `convert.rs`.

pub mod event;
pub mod item;

pub use event::{ChangeEvent, ChangeSource};
pub use item::{Item, ItemKind};
