//! The pool-mode market daemon.
//!
//! # Data Flow
//! ```text
//! MarketConfig
//!     → modules.rs (core, journal, auth, piece-storage, market-api)
//!     → compose → Injector::build → LifecycleManager::start
//!     → Slot<Arc<MarketNode>> → PermissionProxy
//!     → RpcRouter (/rpc/v0, /resource) until the finish signal
//! ```

pub mod api;
pub mod daemon;
pub mod journal;
pub mod modules;
pub mod piece_store;

pub use api::{MarketNode, VersionInfo, API_VERSION};
pub use daemon::{run_pool, PoolDaemon};
pub use journal::{FsJournal, JournalEntry, JournalError};
pub use modules::{AuthModule, CoreModule, JournalModule, MarketApiModule, PieceStorageModule};
pub use piece_store::{FsPieceStore, StoreInfo};
