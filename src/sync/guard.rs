use std::{
    ops::{Deref, DerefMut},
    sync::{Mutex, MutexGuard, PoisonError},
    thread::{self, ThreadId},
};

/// Mutex over the synchronizer state that knows which thread is propagating.
///
/// A second `enter` from the owning thread (a view callback reacting to our
/// own write) is refused. Other threads block until the propagation ends.
pub struct PropagationLock<T> {
    state: Mutex<T>,
    owner: Mutex<Option<ThreadId>>,
}

impl<T> PropagationLock<T> {
    pub fn new(state: T) -> Self {
        Self {
            state: Mutex::new(state),
            owner: Mutex::new(None),
        }
    }

    /// `None` when the calling thread is already propagating.
    pub fn enter(&self) -> Option<PropagationGuard<'_, T>> {
        let current = thread::current().id();
        // Only this thread ever stores its own id, so the check cannot race.
        if self.owner() == Some(current) {
            return None;
        }
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *self.owner_slot() = Some(current);
        Some(PropagationGuard {
            state,
            owner: &self.owner,
        })
    }

    /// Plain access for reads. Must not be called from inside a view callback.
    pub fn read(&self) -> MutexGuard<'_, T> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_held(&self) -> bool {
        self.owner().is_some()
    }

    fn owner(&self) -> Option<ThreadId> {
        *self.owner_slot()
    }

    fn owner_slot(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive access to the state for one propagation. Clears the owner on
/// drop, including during unwinding, before the state mutex is released.
#[must_use]
pub struct PropagationGuard<'a, T> {
    state: MutexGuard<'a, T>,
    owner: &'a Mutex<Option<ThreadId>>,
}

impl<T> Deref for PropagationGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.state
    }
}

impl<T> DerefMut for PropagationGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.state
    }
}

impl<T> Drop for PropagationGuard<'_, T> {
    fn drop(&mut self) {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    #[test]
    fn test_same_thread_reentry_is_refused() {
        let lock = PropagationLock::new(0u32);
        let mut guard = lock.enter().expect("free lock");
        *guard += 1;
        assert!(lock.is_held());
        assert!(lock.enter().is_none());
        drop(guard);
        assert!(!lock.is_held());
        assert_eq!(*lock.enter().expect("released"), 1);
    }

    #[test]
    fn test_other_thread_waits_instead_of_dropping() {
        let lock = Arc::new(PropagationLock::new(Vec::<&str>::new()));
        let (entered_tx, entered_rx) = mpsc::channel();

        let guard = lock.enter().expect("free lock");
        let waiter = {
            let lock = lock.clone();
            std::thread::spawn(move || {
                entered_tx.send(()).expect("signal");
                let mut state = lock.enter().expect("another thread never gets refused");
                state.push("second");
            })
        };
        entered_rx.recv().expect("waiter started");
        std::thread::sleep(Duration::from_millis(50));
        assert!(guard.is_empty(), "the waiter must not run while the lock is held");
        drop(guard);
        waiter.join().expect("waiter finished");

        assert_eq!(*lock.read(), vec!["second"]);
        assert!(!lock.is_held());
    }

    #[test]
    fn test_released_when_propagation_panics() {
        let lock = PropagationLock::new(());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = lock.enter().expect("free lock");
            panic!("view adapter failed");
        }));
        assert!(result.is_err());
        assert!(!lock.is_held());
        assert!(lock.enter().is_some());
    }
}
