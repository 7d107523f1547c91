//! Bound-program tracking.
//!
//! Mirrors the single "current program" of a GPU context. The slot is
//! per thread since a context is only ever current on one thread.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a [`Shader`](super::Shader) instance. Never zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(u64);

impl ShaderId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ShaderId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

thread_local! {
    static BOUND: Cell<u64> = const { Cell::new(0) };
}

/// The currently bound program, if any.
pub fn bound_program() -> Option<ShaderId> {
    match BOUND.with(Cell::get) {
        0 => None,
        id => Some(ShaderId(id)),
    }
}

pub(crate) fn set_bound(id: Option<ShaderId>) {
    BOUND.with(|slot| slot.set(id.map_or(0, ShaderId::get)));
}
