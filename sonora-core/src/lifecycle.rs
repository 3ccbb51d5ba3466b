//! # Lifecycle State Machine
//!
//! Governs which `SoundManager` operations are legal. The state itself is
//! just this enum; the disposal/reload orchestration lives on
//! `SoundManager` since it needs to reach into the atlas and buffer cache.

/// `SoundManager`'s lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundManagerState {
    /// Normal operation: all operations legal.
    Running,
    /// Disposing in-flight loads and cached buffers. Query operations may
    /// return empty collections rather than racing the teardown; mutating
    /// operations are rejected.
    Closing,
    /// Disposal complete. Every mutating operation is a no-op returning
    /// `null`/empty; `reload()` is the only way back to `Running`.
    Disposed,
}

impl SoundManagerState {
    /// May a *mutating* operation (selection changes, cache loads) proceed?
    pub fn allows_mutation(self) -> bool {
        matches!(self, SoundManagerState::Running)
    }

    /// May a *query* operation (enumeration, synchronous lookups) proceed
    /// and return real data, as opposed to an empty/null placeholder?
    pub fn allows_query(self) -> bool {
        matches!(self, SoundManagerState::Running)
    }
}
