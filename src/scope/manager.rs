use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, PoisonError, RwLock};

use super::{Scope, ScopeType};

/// Owns the global, the isolation and the stack of current scopes.
///
/// The global scope is shared by every manager forked from this one.  The
/// isolation scope is created on first use.  The current scope stack always
/// keeps a base scope: its depth equals one plus the number of live
/// [`ScopeManagerGuard`]s and [`IsolationScopeGuard`]s.
///
/// Every [`Hub`](crate::Hub) captures with the
/// [`merged_scope`](Self::merged_scope) of its manager.
#[derive(Debug)]
pub struct ScopeManager {
    global: Arc<RwLock<Scope>>,
    isolation: Option<Scope>,
    current: Scope,
    outer: Vec<Scope>,
}

impl Default for ScopeManager {
    fn default() -> Self {
        ScopeManager {
            global: Arc::new(RwLock::new(Scope::new(ScopeType::Global))),
            isolation: None,
            current: Scope::new(ScopeType::Current),
            outer: Vec::new(),
        }
    }
}

impl ScopeManager {
    /// Creates a manager with its own, empty global scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager whose base current scope is a copy of `scope`.
    pub(crate) fn with_current(scope: &Scope) -> Self {
        ScopeManager {
            current: Scope {
                ty: ScopeType::Current,
                ..scope.clone()
            },
            ..Self::default()
        }
    }

    /// Creates a manager for another unit of work.
    ///
    /// The global scope is shared, the isolation scope and the innermost
    /// current scope are copied.
    pub fn fork(&self) -> ScopeManager {
        ScopeManager {
            global: self.global.clone(),
            isolation: self.isolation.clone(),
            current: self.current.clone(),
            outer: Vec::new(),
        }
    }

    /// A snapshot of the process wide scope.
    pub fn global_scope(&self) -> Scope {
        self.global
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Modifies the process wide scope.
    ///
    /// Changes are visible to every manager sharing this global scope.
    pub fn configure_global_scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Scope) -> R,
    {
        let mut global = self.global.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut global)
    }

    /// The scope of the current unit of work.
    pub fn isolation_scope(&mut self) -> &mut Scope {
        self.isolation
            .get_or_insert_with(|| Scope::new(ScopeType::Isolation))
    }

    /// The innermost current scope.
    pub fn current_scope(&mut self) -> &mut Scope {
        &mut self.current
    }

    pub(crate) fn current(&self) -> &Scope {
        &self.current
    }

    /// The number of current scopes, including the base scope.
    pub fn depth(&self) -> usize {
        self.outer.len() + 1
    }

    /// Pushes a fork of the current scope.
    ///
    /// The fork is popped again when the returned guard is dropped.
    pub fn push_scope(&mut self) -> ScopeManagerGuard<'_> {
        let depth = self.push_fork();
        ScopeManagerGuard {
            manager: self,
            depth,
        }
    }

    pub(crate) fn push_fork(&mut self) -> usize {
        let fork = Scope {
            ty: ScopeType::Current,
            ..self.current.clone()
        };
        self.outer.push(mem::replace(&mut self.current, fork));
        self.depth()
    }

    /// Pops the innermost current scope.
    ///
    /// Returns `false` without changing anything when only the base scope
    /// is left.
    pub fn pop_scope(&mut self) -> bool {
        match self.outer.pop() {
            Some(outer) => {
                self.current = outer;
                true
            }
            None => {
                sentry_debug!("[ScopeManager] Refusing to pop the base scope");
                false
            }
        }
    }

    /// Pushes forks of both the current and the isolation scope.
    ///
    /// Dropping the returned guard pops the current scope and restores the
    /// previous isolation scope.
    pub fn push_isolation_scope(&mut self) -> IsolationScopeGuard<'_> {
        let (previous, depth) = self.push_isolation_fork();
        IsolationScopeGuard {
            manager: self,
            previous: Some(previous),
            depth,
        }
    }

    /// Forks the isolation and the current scope, returning the isolation
    /// scope to restore and the new depth.
    pub(crate) fn push_isolation_fork(&mut self) -> (Scope, usize) {
        let previous = self.isolation_scope().clone();
        (previous, self.push_fork())
    }

    pub(crate) fn restore_isolation(&mut self, previous: Scope) {
        self.isolation = Some(previous);
    }

    /// Runs `f` inside a fork of the current scope.
    ///
    /// The fork is popped when `f` returns or unwinds.
    pub fn with_scope<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut ScopeManager) -> R,
    {
        let mut guard = self.push_scope();
        f(&mut guard)
    }

    /// Runs `f` inside forks of the current and the isolation scope.
    ///
    /// Both are restored when `f` returns or unwinds.
    pub fn with_isolation_scope<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut ScopeManager) -> R,
    {
        let mut guard = self.push_isolation_scope();
        f(&mut guard)
    }

    /// Drops the isolation scope and all current scopes.
    ///
    /// The global scope survives.  Used at request or job boundaries.
    pub fn reset_scopes(&mut self) {
        sentry_debug!("[ScopeManager] Resetting isolation and current scopes");
        self.isolation = None;
        self.outer.clear();
        self.current = Scope::new(ScopeType::Current);
    }

    /// Folds global, isolation and current scope into one.
    ///
    /// Later scopes win: current over isolation over global.
    pub fn merged_scope(&self) -> Scope {
        let mut merged = self.global_scope();
        if let Some(isolation) = &self.isolation {
            merged.merge(isolation);
        }
        merged.merge(&self.current);
        merged
    }

    pub(crate) fn pop_to(&mut self, depth: usize) {
        if self.depth() != depth {
            log::error!(
                target: "sentry",
                "scope popped out of order (expected depth {}, found {})",
                depth,
                self.depth()
            );
        }
        while self.depth() >= depth && self.pop_scope() {}
    }
}

/// Pops a current scope when dropped.
///
/// Derefs to the [`ScopeManager`] so nested scopes can be pushed while it
/// is alive.
#[derive(Debug)]
pub struct ScopeManagerGuard<'a> {
    manager: &'a mut ScopeManager,
    depth: usize,
}

impl Deref for ScopeManagerGuard<'_> {
    type Target = ScopeManager;

    fn deref(&self) -> &ScopeManager {
        self.manager
    }
}

impl DerefMut for ScopeManagerGuard<'_> {
    fn deref_mut(&mut self) -> &mut ScopeManager {
        self.manager
    }
}

impl Drop for ScopeManagerGuard<'_> {
    fn drop(&mut self) {
        self.manager.pop_to(self.depth);
    }
}

/// Restores the isolation scope and pops a current scope when dropped.
#[derive(Debug)]
pub struct IsolationScopeGuard<'a> {
    manager: &'a mut ScopeManager,
    previous: Option<Scope>,
    depth: usize,
}

impl Deref for IsolationScopeGuard<'_> {
    type Target = ScopeManager;

    fn deref(&self) -> &ScopeManager {
        self.manager
    }
}

impl DerefMut for IsolationScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut ScopeManager {
        self.manager
    }
}

impl Drop for IsolationScopeGuard<'_> {
    fn drop(&mut self) {
        self.manager.pop_to(self.depth);
        self.manager.isolation = self.previous.take();
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use super::*;

    #[test]
    fn test_every_scope_has_its_type() {
        let mut manager = ScopeManager::new();
        assert_eq!(manager.depth(), 1);
        assert_eq!(manager.global_scope().scope_type(), ScopeType::Global);
        assert_eq!(manager.isolation_scope().scope_type(), ScopeType::Isolation);
        assert_eq!(manager.current_scope().scope_type(), ScopeType::Current);
    }

    #[test]
    fn test_with_scope_forks_and_pops() {
        let mut manager = ScopeManager::new();
        manager.current_scope().set_tag("outer", "1");

        manager.with_scope(|manager| {
            assert_eq!(manager.depth(), 2);
            assert_eq!(manager.current_scope().tag("outer"), Some("1"));
            manager.current_scope().set_tag("inner", "1");

            manager.with_scope(|manager| assert_eq!(manager.depth(), 3));
            assert_eq!(manager.depth(), 2);
        });

        assert_eq!(manager.depth(), 1);
        assert!(manager.current_scope().tag("inner").is_none());
    }

    #[test]
    fn test_pop_never_empties_the_stack() {
        let mut manager = ScopeManager::new();
        assert!(!manager.pop_scope());
        assert_eq!(manager.depth(), 1);

        let mut guard = manager.push_scope();
        assert!(guard.pop_scope());
        assert!(!guard.pop_scope());
        drop(guard);
        assert_eq!(manager.depth(), 1);
    }

    #[test]
    fn test_scope_is_popped_on_panic() {
        let mut manager = ScopeManager::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            manager.with_scope(|manager| {
                manager.current_scope().set_tag("doomed", "yes");
                panic!("boom");
            })
        }));
        assert!(result.is_err());
        assert_eq!(manager.depth(), 1);
        assert!(manager.current_scope().tag("doomed").is_none());
    }

    #[test]
    fn test_isolation_scope_is_restored() {
        let mut manager = ScopeManager::new();
        manager.isolation_scope().set_tag("request", "outer");

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            manager.with_isolation_scope(|manager| {
                assert_eq!(manager.isolation_scope().tag("request"), Some("outer"));
                manager.isolation_scope().set_tag("request", "inner");
                assert_eq!(manager.depth(), 2);
                panic!("boom");
            })
        }));
        assert!(result.is_err());
        assert_eq!(manager.depth(), 1);
        assert_eq!(manager.isolation_scope().tag("request"), Some("outer"));
    }

    #[test]
    fn test_reset_keeps_global() {
        let mut manager = ScopeManager::new();
        manager.configure_global_scope(|scope| scope.set_tag("global", "yes"));
        manager.isolation_scope().set_tag("isolation", "yes");
        let mut guard = manager.push_scope();
        assert_eq!(guard.depth(), 2);
        guard.reset_scopes();
        assert_eq!(guard.depth(), 1);
        drop(guard);

        assert_eq!(manager.depth(), 1);
        assert!(manager.isolation_scope().tag("isolation").is_none());

        let merged = manager.merged_scope();
        assert_eq!(merged.scope_type(), ScopeType::Merged);
        assert_eq!(merged.tag("global"), Some("yes"));
    }

    #[test]
    fn test_forks_share_the_global_scope() {
        let mut manager = ScopeManager::new();
        manager.isolation_scope().set_tag("request", "1");
        let mut fork = manager.fork();

        fork.configure_global_scope(|scope| scope.set_tag("release", "2.0"));
        fork.isolation_scope().set_tag("request", "2");
        fork.current_scope().set_tag("block", "inner");

        let merged = manager.merged_scope();
        assert_eq!(merged.tag("release"), Some("2.0"));
        assert_eq!(merged.tag("request"), Some("1"));
        assert!(merged.tag("block").is_none());
    }

    #[test]
    fn test_merged_scope_layers_in_order() {
        let mut manager = ScopeManager::new();
        manager.configure_global_scope(|scope| {
            scope.set_tag("layer", "global");
            scope.set_tag("global", "yes");
        });
        manager.isolation_scope().set_tag("layer", "isolation");
        manager.with_scope(|manager| {
            manager.current_scope().set_tag("layer", "current");
            let merged = manager.merged_scope();
            assert_eq!(merged.tag("layer"), Some("current"));
            assert_eq!(merged.tag("global"), Some("yes"));
        });
        assert_eq!(manager.merged_scope().tag("layer"), Some("isolation"));
    }
}
