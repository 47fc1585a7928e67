//! Access control for the remote capability surface.
//!
//! # Data Flow
//! ```text
//! bearer token
//!     → verifier.rs (token → Identity { name, level })
//!     → table.rs (operation → required level)
//!     → proxy.rs (compare, then delegate or deny)
//!     → RpcSurface::call (unchanged params, verbatim result)
//! ```
//!
//! # Design Decisions
//! - The table is built once and never mutated
//! - Operations missing from the table are denied
//! - The proxy never touches params or results

pub mod level;
pub mod proxy;
pub mod table;
pub mod verifier;

pub use level::{ParseLevelError, TrustLevel};
pub use proxy::{PermissionProxy, ProxyError};
pub use table::PermissionTable;
pub use verifier::{AuthError, AuthVerifier, Identity, RemoteAuthVerifier, StaticTokenVerifier};
