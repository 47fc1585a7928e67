//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (manager.rs):
//!     Hooks in build order → start each → rollback in reverse on failure
//!
//! Shutdown (monitor.rs):
//!     ShutdownSignal closed → stop hooks in reverse → FinishSignal closed
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → close the ShutdownSignal
//!     second signal → forced exit
//! ```
//!
//! # Design Decisions
//! - Start functions are invoked one at a time, in order
//! - Every stop function runs under its own timeout
//! - The whole teardown is bounded by a global deadline
//! - Shutdown and finish are single-fire broadcasts

pub mod hook;
pub mod manager;
pub mod monitor;
pub mod shutdown;
pub mod signals;

pub use hook::Hook;
pub use manager::{LifecycleError, LifecycleManager, LifecycleTimeouts, StopFailure, StopFailureKind, StopReport};
pub use monitor::{MonitorHandle, MonitorState, ShutdownMonitor};
pub use shutdown::{FinishSignal, ShutdownReason, ShutdownSignal};
