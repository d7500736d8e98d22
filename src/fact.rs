//! Memoized capability facts.
//!
//! A [`CapabilityFact`] starts `Unresolved`, runs its probe on the first
//! query and stays `Resolved` for the rest of the device session. A probe that
//! returns an error leaves the fact `Unresolved`, so busy and hard failures are
//! never cached.
//!
//! First resolution is serialized per fact: while one caller runs the probe,
//! other callers of the same fact block and then observe the stored value.
//! Probes with hardware side effects therefore never run twice concurrently.

use once_cell::sync::OnceCell;

/// Resolution state of a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactState {
    /// Not probed yet, or every probe so far failed
    Unresolved,
    /// Value known; no further probing
    Resolved,
}

/// Lazily computed, write-once capability value.
#[derive(Debug)]
pub struct CapabilityFact<T> {
    cell: OnceCell<T>,
}

impl<T> CapabilityFact<T> {
    /// Fact that has not been probed.
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Fact that is already known, e.g. from a table lookup.
    pub fn resolved(value: T) -> Self {
        Self {
            cell: OnceCell::with_value(value),
        }
    }

    /// Current resolution state.
    pub fn state(&self) -> FactState {
        if self.cell.get().is_some() {
            FactState::Resolved
        } else {
            FactState::Unresolved
        }
    }

    /// Cached value, without probing.
    pub fn peek(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Return the cached value or run `probe` to resolve it.
    ///
    /// `probe` runs at most once per successful resolution. On error nothing
    /// is stored and the error is returned unchanged.
    pub fn get_or_probe<E, F>(&self, probe: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.cell.get_or_try_init(probe)
    }
}

impl<T> Default for CapabilityFact<T> {
    fn default() -> Self {
        Self::new()
    }
}
