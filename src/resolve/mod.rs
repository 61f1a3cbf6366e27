//! Error resolution: translating low-level errors into domain errors.
//!
//! A *resolver* inspects an error (plus the call stack it surfaced on)
//! and either produces a wrapped domain error or passes. Resolvers are
//! registered process-wide; [`resolve_error`] walks them in
//! registration order and returns the first match, falling back to an
//! optional default resolver, and finally to the input itself.
//!
//! Intended for the seams where third-party errors surface in known
//! call sites: register a [`TypedResolver`] for the library's error
//! type, optionally constrained to stacks that pass through a given
//! file or function, and call [`resolve_error`] at the boundary.
//!
//! - **resolver.rs**: the [`Resolve`] trait and [`TypedResolver`].
//! - **registry.rs**: the process-wide registry.

mod registry;
mod resolver;

pub use registry::{clear_resolvers, register_resolver, resolve_error, set_default_resolver};
pub use resolver::{Resolve, TypedResolver};
