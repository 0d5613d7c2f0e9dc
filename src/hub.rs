use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{PoisonError, RwLock};

use uuid::Uuid;

use crate::breadcrumbs::IntoBreadcrumbs;
use crate::eventprocessor::EventHint;
use crate::hub_impl::HubImpl;
use crate::protocol::{CheckIn, Event, Level};
use crate::stack::ScopeGuard;
use crate::utils::panic_message;
use crate::Scope;

/// The central object that can manage scopes and clients.
///
/// This can be used to capture events and manage the scope.  This object is
/// internally synchronized so it can be used from multiple threads if needed.
///
/// Each hub holds a stack of layers, every layer pairing a client with a
/// current scope.  Captures always use the top layer, layered over the
/// hub's isolation scope and the global scope.  The bottom layer can never
/// be popped.
///
/// In most situations developers do not need to interface the hub.  Instead
/// toplevel convenience functions are exposed that will automatically dispatch
/// to the thread-local ([`Hub::current`]) hub.  In some situations this might
/// not be possible in which case it might become necessary to manually work
/// with the hub.  This is for instance the case when working with a
/// [`RuntimeContextManager`](crate::RuntimeContextManager).
pub struct Hub {
    pub(crate) inner: HubImpl,
    pub(crate) last_event_id: RwLock<Option<Uuid>>,
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("depth", &self.inner.with(|stack| stack.depth()))
            .field("last_event_id", &self.last_event_id())
            .finish()
    }
}

impl Hub {
    /// Sends the event to the current client with the merged scope.
    ///
    /// The global, the isolation and the current scope are folded into one
    /// before the client applies them.
    ///
    /// Returns the id of the event if it was sent.  Without a bound client,
    /// or when the event is dropped on the way, this returns `None`.
    ///
    /// See the global [`capture_event`](crate::capture_event)
    /// for more documentation.
    pub fn capture_event(&self, event: Event) -> Option<Uuid> {
        self.capture_event_with_hint(event, &EventHint::new())
    }

    /// Like [`capture_event`](Self::capture_event), handing `hint` to the
    /// event processors.
    ///
    /// A panic raised while the event is processed is logged and the event
    /// is dropped.
    pub fn capture_event_with_hint(&self, event: Event, hint: &EventHint) -> Option<Uuid> {
        let event_id = self.inner.with(|stack| {
            let client = stack.client()?;
            let id = event.event_id;
            panic::catch_unwind(AssertUnwindSafe(|| {
                let scope = stack.scopes().merged_scope();
                client.capture_event(event, Some(hint), Some(&scope))
            }))
            .unwrap_or_else(|payload| {
                log::error!(
                    target: "sentry",
                    "panic while capturing event {}: {}",
                    id,
                    panic_message(payload.as_ref())
                );
                None
            })
        });

        if let Some(event_id) = event_id {
            *self
                .last_event_id
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(event_id);
        }
        event_id
    }

    /// Captures an arbitrary message.
    ///
    /// See the global [`capture_message`](crate::capture_message)
    /// for more documentation.
    pub fn capture_message(&self, msg: &str, level: Level) -> Option<Uuid> {
        let event = Event {
            message: Some(msg.to_string()),
            level: Some(level),
            ..Default::default()
        };
        self.capture_event(event)
    }

    /// Sends a monitor check-in.
    pub fn capture_check_in(&self, check_in: CheckIn) -> Option<Uuid> {
        self.capture_event(Event::check_in(check_in))
    }

    /// Returns the id of the last event that was sent through this hub.
    pub fn last_event_id(&self) -> Option<Uuid> {
        *self
            .last_event_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Invokes a function that can modify the current scope.
    ///
    /// The function is not called, and `R::default()` is returned, when no
    /// client is bound.
    ///
    /// See the global [`configure_scope`](crate::configure_scope)
    /// for more documentation.
    pub fn configure_scope<F, R>(&self, f: F) -> R
    where
        R: Default,
        F: FnOnce(&mut Scope) -> R,
    {
        if self.client().is_none() {
            return Default::default();
        }
        self.with_current_scope_mut(f)
    }

    /// Invokes a function that can modify the global scope.
    ///
    /// The global scope is shared with every hub created through
    /// [`Hub::new_from_top`] and is applied to all of their events.  Like
    /// [`configure_scope`](Self::configure_scope), the function is only
    /// called when a client is bound.
    pub fn configure_global_scope<F, R>(&self, f: F) -> R
    where
        R: Default,
        F: FnOnce(&mut Scope) -> R,
    {
        if self.client().is_none() {
            return Default::default();
        }
        self.inner
            .with(|stack| stack.scopes().configure_global_scope(f))
    }

    /// Invokes a function that can modify the isolation scope.
    ///
    /// The isolation scope holds the data of the current unit of work and
    /// sits between the global and the current scope.  The function is only
    /// called when a client is bound.
    pub fn configure_isolation_scope<F, R>(&self, f: F) -> R
    where
        R: Default,
        F: FnOnce(&mut Scope) -> R,
    {
        if self.client().is_none() {
            return Default::default();
        }
        self.inner
            .with_mut(|stack| f(stack.scopes_mut().isolation_scope()))
    }

    /// Pushes a new scope.
    ///
    /// This returns a guard that when dropped will pop the scope again.
    pub fn push_scope(&self) -> ScopeGuard {
        self.inner.with_mut(|stack| {
            stack.push();
            ScopeGuard(Some((self.inner.stack.clone(), stack.depth(), None)))
        })
    }

    /// Pushes a new scope and forks the isolation scope.
    ///
    /// Dropping the returned guard pops the scope and restores the previous
    /// isolation scope.
    pub fn push_isolation_scope(&self) -> ScopeGuard {
        self.inner.with_mut(|stack| {
            let (previous, depth) = stack.push_isolation();
            ScopeGuard(Some((self.inner.stack.clone(), depth, Some(previous))))
        })
    }

    /// Pops the top layer.
    ///
    /// Returns `false` and leaves the hub unchanged when only one layer is
    /// left.  Prefer the guard returned by [`push_scope`](Self::push_scope).
    pub fn pop_scope(&self) -> bool {
        self.inner.with_mut(|stack| stack.pop())
    }

    /// The number of layers on the stack.
    pub fn depth(&self) -> usize {
        self.inner.with(|stack| stack.depth())
    }

    /// Temporarily pushes a scope for a single call optionally reconfiguring it.
    ///
    /// The scope is popped again when `callback` returns or unwinds.
    ///
    /// See the global [`with_scope`](crate::with_scope)
    /// for more documentation.
    pub fn with_scope<C, F, R>(&self, scope_config: C, callback: F) -> R
    where
        C: FnOnce(&mut Scope),
        F: FnOnce() -> R,
    {
        let _guard = self.push_scope();
        self.configure_scope(scope_config);
        callback()
    }

    /// Runs `callback` with forks of the isolation and the current scope.
    ///
    /// `scope_config` modifies the forked isolation scope.  Both scopes are
    /// restored when `callback` returns or unwinds.
    pub fn with_isolation_scope<C, F, R>(&self, scope_config: C, callback: F) -> R
    where
        C: FnOnce(&mut Scope),
        F: FnOnce() -> R,
    {
        let _guard = self.push_isolation_scope();
        self.configure_isolation_scope(scope_config);
        callback()
    }

    /// Adds new breadcrumbs to the current scope.
    ///
    /// Every breadcrumb passes the `before_breadcrumb` hook of the bound
    /// client.  Returns whether any breadcrumb was recorded; without a
    /// client nothing is.
    ///
    /// See the global [`add_breadcrumb`](crate::add_breadcrumb)
    /// for more documentation.
    pub fn add_breadcrumb<B: IntoBreadcrumbs>(&self, breadcrumbs: B) -> bool {
        self.inner.with_mut(|stack| {
            let Some(client) = stack.client().cloned() else {
                return false;
            };
            let options = client.options();
            let scope = stack.scopes_mut().current_scope();

            let mut accepted = false;
            for breadcrumb in breadcrumbs.into_breadcrumbs() {
                let breadcrumb = match &options.before_breadcrumb {
                    Some(callback) => callback(breadcrumb),
                    None => Some(breadcrumb),
                };
                if let Some(breadcrumb) = breadcrumb {
                    scope.add_breadcrumb(breadcrumb, options.max_breadcrumbs);
                    accepted = true;
                }
            }
            accepted
        })
    }
}

impl AsRef<Hub> for Hub {
    fn as_ref(&self) -> &Hub {
        self
    }
}
