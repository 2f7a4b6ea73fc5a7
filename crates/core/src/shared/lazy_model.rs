use std::sync::{Arc, Mutex, MutexGuard};

/// Builds a model on first use. Shared by worker threads, so `Send + Sync`.
pub type ModelLoader<T> =
    Box<dyn Fn() -> Result<Arc<T>, Box<dyn std::error::Error>> + Send + Sync>;

/// A model handle that is built on first use and shared afterwards.
///
/// The lock is held only for the check-and-create step, so concurrent first
/// callers block until the winner finishes loading and then all receive the
/// same `Arc`. A failed load leaves the slot empty and the next call retries.
pub struct LazyModel<T: ?Sized> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T: ?Sized> LazyModel<T> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Return the loaded model, running `init` under the lock if it is not loaded yet.
    pub fn get_or_try_init<E>(
        &self,
        init: impl FnOnce() -> Result<Arc<T>, E>,
    ) -> Result<Arc<T>, E> {
        let mut slot = self.lock();
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }
        let model = init()?;
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().is_some()
    }

    // A panic inside `init` poisons the lock without storing anything, so the
    // slot is still consistent and can be reused.
    fn lock(&self) -> MutexGuard<'_, Option<Arc<T>>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: ?Sized> Default for LazyModel<T> {
    fn default() -> Self {
        Self::new()
    }
}
