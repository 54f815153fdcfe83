//! Utilities for memory-efficient data structures.
//!
//! This module provides low-level utilities used internally by the runtime.
//! In particular, it exposes a [`Slab`] arena used by the mutex wait queue
//! for indexed waiter slots with reuse of freed keys.

mod slab;

pub(crate) use slab::Slab;
