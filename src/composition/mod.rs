//! Composition subsystem: provider registry and dependency injection.
//!
//! # Data Flow
//! ```text
//! Module::configure(&config)
//!     → ModuleOptions (Provide / Override / Invoke)
//!     → registry.rs (keyed store, duplicate detection)
//!     → injector.rs (cycle check → build order → construct → invokes)
//!     → Assembly { ObjectGraph, hooks in build order }
//! ```
//!
//! # Design Decisions
//! - Dependencies are declared explicitly per provider, never inferred
//! - Cycle and missing-dependency checks run before any constructor
//! - Construction is synchronous and single-threaded
//! - A failed constructor aborts the whole build (no partial graphs)
//! - The registry is consumed by value; nothing mutable survives the build

pub mod graph;
pub mod injector;
pub mod key;
pub mod module;
pub mod provider;
pub mod registry;

pub use graph::{GraphError, ObjectGraph};
pub use injector::{Assembly, InjectError, Injector};
pub use key::CapabilityKey;
pub use module::{compose, ComposeError, Module};
pub use provider::{Invoke, InvokeContext, Provider, ProviderContext, Slot};
pub use registry::{Entry, ModuleOptions, ProviderRegistry, RegistryError};

/// Boxed error returned by constructors, invokes and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
