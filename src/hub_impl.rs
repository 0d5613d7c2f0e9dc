use std::cell::{Cell, UnsafeCell};
use std::marker::PhantomData;
use std::sync::{Arc, LazyLock, MutexGuard, PoisonError, RwLock, TryLockError};
use std::thread;

use crate::stack::Stack;
use crate::{Client, Hub, Scope};

/// The hub of the thread that first touched the SDK, and that thread's id.
static PROCESS_HUB: LazyLock<(Arc<Hub>, thread::ThreadId)> = LazyLock::new(|| {
    (
        Arc::new(Hub::new(None, Arc::new(Default::default()))),
        thread::current().id(),
    )
});

thread_local! {
    static THREAD_HUB: (UnsafeCell<Arc<Hub>>, Cell<bool>) = (
        UnsafeCell::new(Arc::new(Hub::new_from_top(&PROCESS_HUB.0))),
        Cell::new(PROCESS_HUB.1 == thread::current().id())
    );
}

/// A guard that temporarily swaps the active hub in thread-local storage.
///
/// This type is `!Send` because it manages thread-local state and must be
/// dropped on the same thread where it was created.
pub struct SwitchGuard {
    inner: Option<(Arc<Hub>, bool)>,
    _not_send: PhantomData<MutexGuard<'static, ()>>,
}

impl SwitchGuard {
    /// Installs `hub` as the current thread's hub until the guard is dropped.
    pub fn new(mut hub: Arc<Hub>) -> Self {
        let inner = THREAD_HUB.with(|(thread_hub, is_process_hub)| {
            // SAFETY: the cell is thread local and no reference into it
            // outlives this closure.
            let thread_hub = unsafe { &mut *thread_hub.get() };
            if std::ptr::eq(thread_hub.as_ref(), hub.as_ref()) {
                return None;
            }
            std::mem::swap(thread_hub, &mut hub);
            let was_process_hub = is_process_hub.replace(false);
            Some((hub, was_process_hub))
        });
        SwitchGuard {
            inner,
            _not_send: PhantomData,
        }
    }

    fn swap(&mut self) -> Option<Arc<Hub>> {
        let (mut hub, was_process_hub) = self.inner.take()?;
        Some(THREAD_HUB.with(|(thread_hub, is_process_hub)| {
            // SAFETY: see `SwitchGuard::new`.
            let thread_hub = unsafe { &mut *thread_hub.get() };
            std::mem::swap(thread_hub, &mut hub);
            if was_process_hub {
                is_process_hub.set(true);
            }
            hub
        }))
    }
}

impl Drop for SwitchGuard {
    fn drop(&mut self) {
        let _ = self.swap();
    }
}

#[derive(Debug)]
pub(crate) struct HubImpl {
    pub(crate) stack: Arc<RwLock<Stack>>,
}

impl HubImpl {
    pub(crate) fn with<F: FnOnce(&Stack) -> R, R>(&self, f: F) -> R {
        let guard = self.stack.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub(crate) fn with_mut<F: FnOnce(&mut Stack) -> R, R>(&self, f: F) -> R {
        let mut guard = self.stack.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Whether a client is bound and the stack is not locked for writing.
    ///
    /// A write lock held by this very thread means we were called from
    /// inside `configure_scope`, where capturing would deadlock.
    pub(crate) fn is_active_and_usage_safe(&self) -> bool {
        let guard = match self.stack.try_read() {
            Err(TryLockError::Poisoned(err)) => err.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
            Ok(guard) => guard,
        };

        guard.client().is_some_and(|c| c.is_enabled())
    }
}

impl Hub {
    /// Creates a new hub from the given client and scope.
    ///
    /// The hub starts out with its own global scope.
    pub fn new(client: Option<Arc<Client>>, scope: Arc<Scope>) -> Hub {
        Hub::from_stack(Stack::from_client_and_scope(client, scope))
    }

    /// Creates a new hub based on the top layer of the given hub.
    ///
    /// The new hub shares the global scope of `other` and starts with copies
    /// of its isolation scope and its innermost current scope.
    pub fn new_from_top<H: AsRef<Hub>>(other: H) -> Hub {
        let hub = other.as_ref();
        hub.inner.with(|stack| Hub::from_stack(stack.fork()))
    }

    fn from_stack(stack: Stack) -> Hub {
        Hub {
            inner: HubImpl {
                stack: Arc::new(RwLock::new(stack)),
            },
            last_event_id: RwLock::new(None),
        }
    }

    /// Returns the current, thread-local hub.
    ///
    /// The first time it is called on a thread, a new thread-local hub is
    /// created from the topmost scope of the hub on the main thread as
    /// returned by [`Hub::main`].
    ///
    /// To have control over which hub is installed as the current
    /// thread-local hub, use [`Hub::run`].
    pub fn current() -> Arc<Hub> {
        Hub::with(Arc::clone)
    }

    /// Returns the main thread's hub.
    ///
    /// This is similar to [`Hub::current`] but instead of picking the
    /// current thread's hub it returns the main thread's hub instead.
    pub fn main() -> Arc<Hub> {
        PROCESS_HUB.0.clone()
    }

    /// Invokes the callback with the default hub.
    ///
    /// This is a slightly more efficient version than [`Hub::current`].
    pub fn with<F, R>(f: F) -> R
    where
        F: FnOnce(&Arc<Hub>) -> R,
    {
        THREAD_HUB.with(|(hub, is_process_hub)| {
            if is_process_hub.get() {
                f(&PROCESS_HUB.0)
            } else {
                // SAFETY: the thread hub is only replaced through a
                // `SwitchGuard`, which cannot be created inside `f` without
                // outliving this borrow.
                f(unsafe { &*hub.get() })
            }
        })
    }

    /// Like [`Hub::with`] but only calls the function if a client is bound.
    ///
    /// This is useful for integrations that want to do efficiently nothing if
    /// there is no client bound.  It also prevents recursive calls into the
    /// client from inside `configure_scope`.
    pub fn with_active<F, R>(f: F) -> R
    where
        F: FnOnce(&Arc<Hub>) -> R,
        R: Default,
    {
        Hub::with(|hub| {
            if hub.is_active_and_usage_safe() {
                f(hub)
            } else {
                Default::default()
            }
        })
    }

    /// Binds a hub to the current thread for the duration of the call.
    ///
    /// During the execution of `f` the given hub will be installed as the
    /// thread-local hub.  So any call to [`Hub::current`] during this time
    /// will return the provided hub.
    ///
    /// Once the function is finished executing, including after it
    /// panicked, the original hub is re-installed if one was present.
    pub fn run<F: FnOnce() -> R, R>(hub: Arc<Hub>, f: F) -> R {
        let _guard = SwitchGuard::new(hub);
        f()
    }

    /// Returns the currently bound client.
    pub fn client(&self) -> Option<Arc<Client>> {
        self.inner.with(|stack| stack.client().cloned())
    }

    /// Binds a new client to the top layer of the hub.
    pub fn bind_client(&self, client: Option<Arc<Client>>) {
        self.inner.with_mut(|stack| {
            stack.set_client(client);
        })
    }

    pub(crate) fn is_active_and_usage_safe(&self) -> bool {
        self.inner.is_active_and_usage_safe()
    }

    pub(crate) fn with_current_scope<F: FnOnce(&Scope) -> R, R>(&self, f: F) -> R {
        self.inner.with(|stack| f(stack.scopes().current()))
    }

    pub(crate) fn with_current_scope_mut<F: FnOnce(&mut Scope) -> R, R>(&self, f: F) -> R {
        self.inner
            .with_mut(|stack| f(stack.scopes_mut().current_scope()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_swaps_and_restores() {
        let outer = Hub::current();
        let hub = Arc::new(Hub::new(None, Default::default()));

        Hub::run(hub.clone(), || {
            assert!(Arc::ptr_eq(&Hub::current(), &hub));
            Hub::run(hub.clone(), || assert!(Arc::ptr_eq(&Hub::current(), &hub)));
        });
        assert!(Arc::ptr_eq(&Hub::current(), &outer));
    }

    #[test]
    fn test_threads_inherit_the_main_scope() {
        let main = Hub::main();
        let handle = thread::spawn(move || {
            let current = Hub::current();
            !Arc::ptr_eq(&current, &main)
        });
        assert!(handle.join().unwrap());
    }
}
