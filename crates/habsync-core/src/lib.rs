// habsync-core: Item synchronization and caching layer between habsync-api and UI consumers.

pub mod command;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult, OnOff, clamp, extract_numeric};
pub use config::{ConnectionConfig, TlsVerification};
pub use engine::{EngineState, SyncEngine};
pub use error::CoreError;
pub use model::{ChangeEvent, ChangeSource, Item, ItemKind};
pub use store::{ItemGroup, ItemRegistry, UNGROUPED_LABEL};
pub use stream::{ChangeObserver, ChangeStream, ChangeSubscription, ObserverHandle};
