//! Dependency injector.
//!
//! # Responsibilities
//! - Validate the provider graph (missing keys, cycles) before construction
//! - Build every capability once, dependencies first
//! - Run invokes in ascending priority over the finished graph
//! - Collect lifecycle hooks in build order
//!
//! # Algorithm
//! ```text
//! registration order
//!     → depth-first post-order over declared deps (grey node ⇒ cycle)
//!     → build order
//!     → construct each key, caching the instance
//!     → stable sort invokes by priority, run each
//! ```

use std::collections::HashMap;
use thiserror::Error;

use crate::composition::graph::ObjectGraph;
use crate::composition::key::CapabilityKey;
use crate::composition::provider::{InvokeContext, ProviderContext, Source};
use crate::composition::registry::{ProviderRegistry, Registered, RegisteredInvoke};
use crate::composition::BoxError;
use crate::lifecycle::{Hook, LifecycleManager, LifecycleTimeouts};

/// Errors that abort a build.
#[derive(Debug, Error)]
pub enum InjectError {
    /// The declared dependencies form a cycle. The first key is repeated at the end.
    #[error("dependency cycle detected: {}", format_path(.cycle))]
    Cycle { cycle: Vec<CapabilityKey> },

    /// A provider or invoke depends on a key nobody provides.
    #[error("capability {key} required by {required_by} is not provided by any module")]
    MissingDependency {
        key: CapabilityKey,
        required_by: String,
    },

    /// A constructor returned an error.
    #[error("failed to construct {key} (module '{module}'): {source}")]
    Construction {
        key: CapabilityKey,
        module: String,
        #[source]
        source: BoxError,
    },

    /// An invoke returned an error.
    #[error("invoke '{name}' (module '{module}') failed: {source}")]
    Invoke {
        name: String,
        module: String,
        #[source]
        source: BoxError,
    },

    /// More than one lifecycle hook was attached to the same capability.
    #[error("capability {key} has more than one lifecycle hook")]
    DuplicateHook { key: CapabilityKey },
}

fn format_path(keys: &[CapabilityKey]) -> String {
    keys.iter()
        .map(|k| k.name())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result of a successful build.
pub struct Assembly {
    graph: ObjectGraph,
    build_order: Vec<CapabilityKey>,
    hooks: Vec<(CapabilityKey, Hook)>,
}

impl Assembly {
    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    /// Keys in the order their providers ran.
    pub fn build_order(&self) -> &[CapabilityKey] {
        &self.build_order
    }

    /// Owners of registered hooks, in build order.
    pub fn hooked(&self) -> Vec<CapabilityKey> {
        self.hooks.iter().map(|(key, _)| *key).collect()
    }

    /// Split into the immutable graph and a lifecycle manager for its hooks.
    pub fn into_lifecycle(self, timeouts: LifecycleTimeouts) -> (ObjectGraph, LifecycleManager) {
        (self.graph, LifecycleManager::new(self.hooks, timeouts))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Turns a registry into a fully wired object graph.
pub struct Injector;

impl Injector {
    pub fn build(registry: ProviderRegistry) -> Result<Assembly, InjectError> {
        let (order, mut providers, mut invokes) = registry.into_parts();

        let build_order = resolve_order(&order, &providers)?;
        for registered in &invokes {
            for key in registered.invoke.required() {
                if !providers.contains_key(key) {
                    return Err(InjectError::MissingDependency {
                        key: *key,
                        required_by: format!("invoke '{}'", registered.invoke.name()),
                    });
                }
            }
        }

        tracing::debug!(capabilities = build_order.len(), "Dependency graph resolved");

        let mut graph = ObjectGraph::default();
        let mut hooks: HashMap<CapabilityKey, Hook> = HashMap::new();

        for key in &build_order {
            let Some(Registered { provider, module }) = providers.remove(key) else {
                continue;
            };
            let deps = provider.deps().to_vec();
            match provider.into_source() {
                Source::Value(instance) => graph.insert(*key, instance),
                Source::Constructor(constructor) => {
                    let mut ctx = ProviderContext::new(*key, &deps, &graph);
                    let instance = constructor(&mut ctx).map_err(|source| {
                        InjectError::Construction {
                            key: *key,
                            module: module.clone(),
                            source,
                        }
                    })?;
                    let built_hooks = ctx.into_hooks();
                    graph.insert(*key, instance);
                    for hook in built_hooks {
                        attach(&mut hooks, *key, hook)?;
                    }
                }
            }
            tracing::trace!(capability = %key, module = %module, "Capability built");
        }

        // stable: equal priorities keep registration order
        invokes.sort_by_key(|registered| registered.invoke.priority());
        for RegisteredInvoke { invoke, module } in invokes {
            let name = invoke.name().to_string();
            let mut ctx = InvokeContext::new(&graph);
            invoke
                .run(&mut ctx)
                .map_err(|source| InjectError::Invoke {
                    name: name.clone(),
                    module,
                    source,
                })?;
            for (owner, hook) in ctx.into_hooks() {
                if !graph.contains(&owner) {
                    return Err(InjectError::MissingDependency {
                        key: owner,
                        required_by: format!("invoke '{name}'"),
                    });
                }
                attach(&mut hooks, owner, hook)?;
            }
        }

        let hooks = build_order
            .iter()
            .filter_map(|key| hooks.remove(key).map(|hook| (*key, hook)))
            .collect::<Vec<_>>();

        tracing::info!(
            capabilities = graph.len(),
            lifecycle_hooks = hooks.len(),
            "Object graph built"
        );

        Ok(Assembly {
            graph,
            build_order,
            hooks,
        })
    }
}

fn attach(
    hooks: &mut HashMap<CapabilityKey, Hook>,
    key: CapabilityKey,
    hook: Hook,
) -> Result<(), InjectError> {
    if hooks.contains_key(&key) {
        return Err(InjectError::DuplicateHook { key });
    }
    hooks.insert(key, hook);
    Ok(())
}

fn resolve_order(
    order: &[CapabilityKey],
    providers: &HashMap<CapabilityKey, Registered>,
) -> Result<Vec<CapabilityKey>, InjectError> {
    let mut marks = HashMap::with_capacity(order.len());
    let mut stack = Vec::new();
    let mut out = Vec::with_capacity(order.len());
    for key in order {
        visit(*key, providers, &mut marks, &mut stack, &mut out)?;
    }
    Ok(out)
}

fn visit(
    key: CapabilityKey,
    providers: &HashMap<CapabilityKey, Registered>,
    marks: &mut HashMap<CapabilityKey, Mark>,
    stack: &mut Vec<CapabilityKey>,
    out: &mut Vec<CapabilityKey>,
) -> Result<(), InjectError> {
    match marks.get(&key) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = stack.iter().position(|k| *k == key).unwrap_or(0);
            let mut cycle = stack[start..].to_vec();
            cycle.push(key);
            return Err(InjectError::Cycle { cycle });
        }
        None => {}
    }

    marks.insert(key, Mark::Visiting);
    stack.push(key);
    if let Some(registered) = providers.get(&key) {
        for dep in registered.provider.deps() {
            if !providers.contains_key(dep) {
                return Err(InjectError::MissingDependency {
                    key: *dep,
                    required_by: key.to_string(),
                });
            }
            visit(*dep, providers, marks, stack, out)?;
        }
    }
    stack.pop();
    marks.insert(key, Mark::Done);
    out.push(key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::provider::{Invoke, Provider, Slot};
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct A;
    #[derive(Debug)]
    struct B(Arc<A>);
    #[derive(Debug)]
    struct C;
    #[derive(Debug)]
    struct D;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn key<T: 'static>() -> CapabilityKey {
        CapabilityKey::of::<T>()
    }

    #[test]
    fn test_a_then_b_with_invoke() {
        let log: Log = Arc::default();
        let mut registry = ProviderRegistry::new();

        // B registered before A on purpose.
        let l = log.clone();
        registry
            .register(
                "b",
                Provider::from_fn(&[key::<Arc<A>>()], move |ctx| {
                    l.lock().unwrap().push("B");
                    Ok(Arc::new(B(ctx.get::<Arc<A>>()?)))
                }),
            )
            .unwrap();
        let l = log.clone();
        registry
            .register(
                "a",
                Provider::from_fn(&[], move |_| {
                    l.lock().unwrap().push("A");
                    Ok(Arc::new(A))
                }),
            )
            .unwrap();

        let seen: Slot<Arc<B>> = Slot::new();
        let l = log.clone();
        registry.invoke(
            "api",
            Invoke::new("check", 0, move |_| {
                l.lock().unwrap().push("invoke");
                Ok(())
            })
            .requires(&[key::<Arc<B>>()]),
        );
        registry.invoke("api", Invoke::populate(10, &seen));

        let assembly = Injector::build(registry).unwrap();
        assert_eq!(assembly.build_order(), &[key::<Arc<A>>(), key::<Arc<B>>()]);
        assert_eq!(*log.lock().unwrap(), vec!["A", "B", "invoke"]);

        let a: Arc<A> = assembly.graph().get().unwrap();
        let b = seen.get().unwrap();
        assert!(Arc::ptr_eq(&a, &b.0));
    }

    #[test]
    fn test_dependency_order_diamond() {
        let log: Log = Arc::default();
        let mut registry = ProviderRegistry::new();

        let l = log.clone();
        registry
            .register(
                "m",
                Provider::from_fn(&[key::<Arc<B>>(), key::<Arc<C>>()], move |_| {
                    l.lock().unwrap().push("D");
                    Ok(Arc::new(D))
                }),
            )
            .unwrap();
        let l = log.clone();
        registry
            .register(
                "m",
                Provider::from_fn(&[key::<Arc<A>>()], move |ctx| {
                    l.lock().unwrap().push("C");
                    ctx.get::<Arc<A>>()?;
                    Ok(Arc::new(C))
                }),
            )
            .unwrap();
        let l = log.clone();
        registry
            .register(
                "m",
                Provider::from_fn(&[key::<Arc<A>>()], move |ctx| {
                    l.lock().unwrap().push("B");
                    Ok(Arc::new(B(ctx.get()?)))
                }),
            )
            .unwrap();
        registry.register("m", Provider::value(Arc::new(A))).unwrap();

        let assembly = Injector::build(registry).unwrap();
        let order = assembly.build_order();
        let pos = |k: CapabilityKey| order.iter().position(|o| *o == k).unwrap();
        assert!(pos(key::<Arc<A>>()) < pos(key::<Arc<B>>()));
        assert!(pos(key::<Arc<A>>()) < pos(key::<Arc<C>>()));
        assert!(pos(key::<Arc<B>>()) < pos(key::<Arc<D>>()));
        assert!(pos(key::<Arc<C>>()) < pos(key::<Arc<D>>()));
        assert_eq!(log.lock().unwrap().last(), Some(&"D"));
    }

    #[test]
    fn test_cycle_detected_before_construction() {
        let built = Arc::new(Mutex::new(false));
        let mut registry = ProviderRegistry::new();
        let flag = built.clone();
        registry
            .register(
                "m",
                Provider::from_fn(&[key::<Arc<B>>()], move |_| {
                    *flag.lock().unwrap() = true;
                    Ok(Arc::new(A))
                }),
            )
            .unwrap();
        registry
            .register("m", Provider::from_fn(&[key::<Arc<C>>()], |_| Ok(Arc::new(B(Arc::new(A))))))
            .unwrap();
        registry
            .register("m", Provider::from_fn(&[key::<Arc<A>>()], |_| Ok(Arc::new(C))))
            .unwrap();
        registry.register("m", Provider::value(Arc::new(D))).unwrap();

        let err = Injector::build(registry).err().unwrap();
        match &err {
            InjectError::Cycle { cycle } => {
                assert_eq!(cycle.len(), 4);
                assert_eq!(cycle.first(), cycle.last());
                assert!(cycle.contains(&key::<Arc<A>>()));
                assert!(cycle.contains(&key::<Arc<B>>()));
                assert!(cycle.contains(&key::<Arc<C>>()));
                assert!(!cycle.contains(&key::<Arc<D>>()));
            }
            other => panic!("expected cycle, got {other}"),
        }
        assert!(err.to_string().contains(" -> "));
        assert!(!*built.lock().unwrap());
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut registry = ProviderRegistry::new();
        registry
            .register("m", Provider::from_fn(&[key::<Arc<A>>()], |_| Ok(Arc::new(A))))
            .unwrap();
        let err = Injector::build(registry).err().unwrap();
        assert!(matches!(err, InjectError::Cycle { ref cycle } if cycle.len() == 2));
    }

    #[test]
    fn test_missing_dependency() {
        let mut registry = ProviderRegistry::new();
        registry
            .register("m", Provider::from_fn(&[key::<Arc<A>>()], |_| Ok(Arc::new(C))))
            .unwrap();
        let err = Injector::build(registry).err().unwrap();
        assert!(matches!(err, InjectError::MissingDependency { key: k, .. } if k == key::<Arc<A>>()));
    }

    #[test]
    fn test_construction_error_aborts_build() {
        let later = Arc::new(Mutex::new(false));
        let mut registry = ProviderRegistry::new();
        registry
            .register("journal", Provider::from_fn(&[], |_| -> Result<Arc<A>, BoxError> {
                Err("disk full".into())
            }))
            .unwrap();
        let flag = later.clone();
        registry
            .register(
                "m",
                Provider::from_fn(&[key::<Arc<A>>()], move |_| {
                    *flag.lock().unwrap() = true;
                    Ok(Arc::new(C))
                }),
            )
            .unwrap();

        let err = Injector::build(registry).err().unwrap();
        match err {
            InjectError::Construction { key: k, module, .. } => {
                assert_eq!(k, key::<Arc<A>>());
                assert_eq!(module, "journal");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!*later.lock().unwrap());
    }

    #[test]
    fn test_undeclared_dependency_fails() {
        let mut registry = ProviderRegistry::new();
        registry.register("m", Provider::value(Arc::new(A))).unwrap();
        registry
            .register(
                "m",
                Provider::from_fn(&[], |ctx| Ok(Arc::new(B(ctx.get::<Arc<A>>()?)))),
            )
            .unwrap();
        let err = Injector::build(registry).err().unwrap();
        assert!(matches!(err, InjectError::Construction { .. }));
        assert!(err.to_string().contains("not declared"));
    }

    #[test]
    fn test_override_visible_to_consumers() {
        let mut registry = ProviderRegistry::new();
        registry.register("defaults", Provider::value(Arc::new(String::from("memory")))).unwrap();
        registry.override_provider("pool", Provider::value(Arc::new(String::from("mysql"))));
        registry
            .register(
                "m",
                Provider::from_fn(&[key::<Arc<String>>()], |ctx| {
                    let backend: Arc<String> = ctx.get()?;
                    Ok(backend.len())
                }),
            )
            .unwrap();
        let assembly = Injector::build(registry).unwrap();
        assert_eq!(assembly.graph().get::<usize>().unwrap(), "mysql".len());
    }

    #[test]
    fn test_invokes_ordered_by_priority_stable() {
        let log: Log = Arc::default();
        let mut registry = ProviderRegistry::new();
        for (name, priority) in [("late", 20), ("first", 1), ("tie-a", 10), ("tie-b", 10)] {
            let l = log.clone();
            registry.invoke(
                "m",
                Invoke::new(name, priority, move |_| {
                    l.lock().unwrap().push(name);
                    Ok(())
                }),
            );
        }
        Injector::build(registry).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first", "tie-a", "tie-b", "late"]);
    }

    #[test]
    fn test_invoke_missing_requirement() {
        let mut registry = ProviderRegistry::new();
        registry.invoke("api", Invoke::new("extract", 10, |_| Ok(())).requires(&[key::<Arc<D>>()]));
        let err = Injector::build(registry).err().unwrap();
        assert!(matches!(err, InjectError::MissingDependency { .. }));
    }

    #[test]
    fn test_duplicate_hook_rejected() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(
                "journal",
                Provider::from_fn(&[], |ctx| {
                    ctx.on_lifecycle(Hook::new().on_start(|| async { Ok(()) }));
                    Ok(Arc::new(A))
                }),
            )
            .unwrap();
        registry.invoke(
            "metrics",
            Invoke::new("hook-a", 0, |ctx| {
                ctx.on_lifecycle(key::<Arc<A>>(), Hook::new().on_stop(|| async { Ok(()) }));
                Ok(())
            }),
        );
        let err = Injector::build(registry).err().unwrap();
        assert!(matches!(err, InjectError::DuplicateHook { key: k } if k == key::<Arc<A>>()));
    }

    #[test]
    fn test_hooks_follow_build_order() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(
                "m",
                Provider::from_fn(&[key::<Arc<A>>()], |ctx| {
                    ctx.on_lifecycle(Hook::new());
                    Ok(Arc::new(C))
                }),
            )
            .unwrap();
        registry.register("m", Provider::value(Arc::new(A))).unwrap();
        registry.invoke(
            "m",
            Invoke::new("hook-a", 0, |ctx| {
                ctx.on_lifecycle(key::<Arc<A>>(), Hook::new());
                Ok(())
            }),
        );
        let assembly = Injector::build(registry).unwrap();
        assert_eq!(assembly.hooked(), vec![key::<Arc<A>>(), key::<Arc<C>>()]);
    }
}
