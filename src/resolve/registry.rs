//! # Process-wide resolver registry.
//!
//! One registry per process, explicitly initialized on first use and
//! clearable for test isolation — no construction magic beyond the
//! lazy cell.
//!
//! ## Rules
//! - Resolvers run in registration order; the first non-`None` wins.
//! - The default resolver (if set) runs only when every registered
//!   resolver passed.
//! - When nothing matches, the input error is returned unchanged.
//! - The stack is captured once per [`resolve_error`] call and shared
//!   with every resolver.

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::BoxError;
use crate::trace::StackTrace;

use super::resolver::Resolve;

static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::default()));

#[derive(Default)]
struct Registry {
    resolvers: Vec<Box<dyn Resolve>>,
    default: Option<Box<dyn Resolve>>,
}

/// Appends a resolver; it runs after everything registered before it.
pub fn register_resolver(resolver: impl Resolve) {
    REGISTRY.write().resolvers.push(Box::new(resolver));
}

/// Sets (or replaces) the fallback resolver consulted when no
/// registered resolver matches.
pub fn set_default_resolver(resolver: impl Resolve) {
    REGISTRY.write().default = Some(Box::new(resolver));
}

/// Empties the registry, including the default resolver.
///
/// Intended for test isolation; production code registers once at
/// startup and never tears down.
pub fn clear_resolvers() {
    let mut registry = REGISTRY.write();
    registry.resolvers.clear();
    registry.default = None;
}

/// Resolves `err` through the registry.
///
/// Captures the current stack, walks resolvers in registration order,
/// and returns the first wrapped error produced; falls back to the
/// default resolver, then to `err` itself.
pub fn resolve_error(err: BoxError) -> BoxError {
    let trace = StackTrace::capture();
    let registry = REGISTRY.read();

    for resolver in &registry.resolvers {
        if let Some(resolved) = resolver.resolve(err.as_ref(), &trace) {
            return resolved;
        }
    }
    if let Some(default) = &registry.default {
        if let Some(resolved) = default.resolve(err.as_ref(), &trace) {
            return resolved;
        }
    }
    err
}
