use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::{Client, Scope, ScopeManager};

/// The layers of a hub, innermost on top.
///
/// Every layer pairs a client with a current scope of the [`ScopeManager`].
/// There is always at least one layer.
#[derive(Debug)]
pub(crate) struct Stack {
    client: Option<Arc<Client>>,
    clients: Vec<Option<Arc<Client>>>,
    scopes: ScopeManager,
}

impl Stack {
    pub fn from_client_and_scope(client: Option<Arc<Client>>, scope: Arc<Scope>) -> Stack {
        Stack {
            client,
            clients: vec![],
            scopes: ScopeManager::with_current(&scope),
        }
    }

    /// A single layer stack sharing the global scope of this one.
    pub fn fork(&self) -> Stack {
        Stack {
            client: self.client.clone(),
            clients: vec![],
            scopes: self.scopes.fork(),
        }
    }

    pub fn push(&mut self) -> usize {
        self.clients.push(self.client.clone());
        self.scopes.push_fork()
    }

    /// Like [`push`](Self::push), also forking the isolation scope.
    pub fn push_isolation(&mut self) -> (Scope, usize) {
        self.clients.push(self.client.clone());
        self.scopes.push_isolation_fork()
    }

    /// Removes the top layer unless it is the last one.
    pub fn pop(&mut self) -> bool {
        match self.clients.pop() {
            Some(client) => {
                self.client = client;
                self.scopes.pop_scope()
            }
            None => false,
        }
    }

    pub fn client(&self) -> Option<&Arc<Client>> {
        self.client.as_ref()
    }

    pub fn set_client(&mut self, client: Option<Arc<Client>>) {
        self.client = client;
    }

    pub fn scopes(&self) -> &ScopeManager {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut ScopeManager {
        &mut self.scopes
    }

    /// The number of layers, including the base layer.
    pub fn depth(&self) -> usize {
        self.clients.len() + 1
    }
}

/// A scope guard.
///
/// This is returned from [`Hub::push_scope`] and will automatically pop the
/// scope on drop.
///
/// [`Hub::push_scope`]: crate::Hub::push_scope
#[derive(Default)]
pub struct ScopeGuard(pub(crate) Option<(Arc<RwLock<Stack>>, usize, Option<Scope>)>);

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeGuard")
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some((stack, depth, isolation)) = self.0.take() {
            let popped_depth = {
                let mut stack = stack.write().unwrap_or_else(PoisonError::into_inner);
                let popped_depth = stack.depth();
                stack.pop();
                if let Some(isolation) = isolation {
                    stack.scopes_mut().restore_isolation(isolation);
                }
                popped_depth
            };
            // the lock must be released before panicking, capturing the
            // panic locks the stack again
            if popped_depth != depth {
                debug_panic_or_log!("Popped scope guard out of order");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_layer_is_never_popped() {
        let mut stack = Stack::from_client_and_scope(None, Default::default());
        assert_eq!(stack.depth(), 1);
        assert!(!stack.pop());
        assert_eq!(stack.depth(), 1);

        assert_eq!(stack.push(), 2);
        stack.scopes_mut().current_scope().set_tag("inner", "yes");
        assert_eq!(stack.depth(), 2);
        assert!(stack.pop());
        assert!(stack.scopes().current().tag("inner").is_none());
    }

    #[test]
    fn test_isolation_layer_is_restored() {
        let mut stack = Stack::from_client_and_scope(None, Default::default());
        stack.scopes_mut().isolation_scope().set_tag("request", "outer");

        let (previous, depth) = stack.push_isolation();
        assert_eq!(depth, 2);
        stack.scopes_mut().isolation_scope().set_tag("request", "inner");
        assert!(stack.pop());
        stack.scopes_mut().restore_isolation(previous);
        assert_eq!(
            stack.scopes_mut().isolation_scope().tag("request"),
            Some("outer")
        );
    }
}
