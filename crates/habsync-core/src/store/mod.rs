// ── Item store ──
//
// Lock-free item storage with push-based change notification, plus the
// grouped catalog view consumed by UI layers.

mod registry;
mod view;

pub use registry::ItemRegistry;
pub use view::{ItemGroup, UNGROUPED_LABEL};
