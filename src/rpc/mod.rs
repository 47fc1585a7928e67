//! Remote access to the assembled daemon.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → router.rs (request id, trace, limits)
//!     → auth.rs (bearer token → Caller, or 401)
//!     ├─ /rpc/v0   → jsonrpc.rs (envelope) → PermissionProxy → RpcSurface
//!     └─ /resource → resource.rs (ResourceStore, no permission check)
//! ```

pub mod auth;
pub mod jsonrpc;
pub mod resource;
pub mod router;
pub mod surface;

pub use auth::Caller;
pub use resource::{resource_route, Resource, ResourceStore};
pub use router::{RpcError, RpcRouter, ServeOptions, RPC_PATH};
pub use surface::{decode_params, encode_result, CallError, RpcSurface};
