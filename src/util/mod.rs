use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod fingerprint;

/// Locks a mutex, recovering the data if a previous holder panicked. State
/// guarded this way is only ever replaced wholesale, so it stays coherent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
