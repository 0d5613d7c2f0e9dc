use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::eventprocessor::{EventHint, EventProcessor};
use crate::performance::{PropagationContext, TraceHeadersIter, TransactionOrSpan};
use crate::protocol::{Breadcrumb, Context, Event, Level, Log, LogAttribute, Map, Metric, User, Value};

mod manager;

pub use self::manager::{IsolationScopeGuard, ScopeManager, ScopeManagerGuard};

/// Which slot a [`Scope`] occupies.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeType {
    /// The process wide scope.
    Global,
    /// The scope of the current unit of work, e.g. a request.
    Isolation,
    /// The innermost scope of the current block.
    #[default]
    Current,
    /// Global, isolation and current scope folded into one.
    Merged,
}

/// Holds contextual data for the current scope.
///
/// The scope is an object that can be cloned efficiently and stores data that
/// is locally relevant to an event.  For instance the scope will hold recorded
/// breadcrumbs and similar information.
///
/// The scope can be interacted with in two ways:
///
/// 1. the scope is routinely updated with information by functions such as
///    [`add_breadcrumb`] which will modify the currently top-most scope.
/// 2. the topmost scope can also be configured through the [`configure_scope`]
///    method.
///
/// Cloning a scope forks it: both copies share their data until one of them
/// is modified, and modifications never leak into the other copy.
///
/// [`add_breadcrumb`]: crate::add_breadcrumb
/// [`configure_scope`]: crate::configure_scope
#[derive(Clone, Default)]
pub struct Scope {
    pub(crate) ty: ScopeType,
    pub(crate) level: Option<Level>,
    pub(crate) fingerprint: Option<Arc<[String]>>,
    pub(crate) transaction: Option<Arc<str>>,
    pub(crate) breadcrumbs: Arc<VecDeque<Breadcrumb>>,
    pub(crate) user: Option<Arc<User>>,
    pub(crate) extra: Arc<Map<String, Value>>,
    pub(crate) tags: Arc<BTreeMap<String, String>>,
    pub(crate) contexts: Arc<BTreeMap<String, Context>>,
    pub(crate) event_processors: Arc<Vec<Arc<dyn EventProcessor>>>,
    pub(crate) span: Arc<Option<TransactionOrSpan>>,
    pub(crate) propagation_context: PropagationContext,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("ty", &self.ty)
            .field("level", &self.level)
            .field("fingerprint", &self.fingerprint)
            .field("transaction", &self.transaction)
            .field("breadcrumbs", &self.breadcrumbs)
            .field("user", &self.user)
            .field("extra", &self.extra)
            .field("tags", &self.tags)
            .field("contexts", &self.contexts)
            .field("event_processors", &self.event_processors.len())
            .field("span", &self.span)
            .field("propagation_context", &self.propagation_context)
            .finish()
    }
}

impl Scope {
    /// Creates an empty scope of the given type.
    pub fn new(ty: ScopeType) -> Self {
        Scope {
            ty,
            ..Default::default()
        }
    }

    /// The slot this scope occupies.
    pub fn scope_type(&self) -> ScopeType {
        self.ty
    }

    /// Clear the scope.
    ///
    /// By default a scope will inherit all values from the higher scope.
    /// In some situations this might not be what a user wants.  Calling
    /// this method will wipe all data contained within, except for the
    /// scope type.
    pub fn clear(&mut self) {
        sentry_debug!("[Scope] Clearing all scope data");
        *self = Scope::new(self.ty);
    }

    /// Adds a breadcrumb, evicting the oldest ones beyond `max_breadcrumbs`.
    pub fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb, max_breadcrumbs: usize) {
        if max_breadcrumbs == 0 {
            return;
        }
        let breadcrumbs = Arc::make_mut(&mut self.breadcrumbs);
        breadcrumbs.push_back(breadcrumb);
        while breadcrumbs.len() > max_breadcrumbs {
            breadcrumbs.pop_front();
        }
    }

    /// Deletes current breadcrumbs from the scope.
    pub fn clear_breadcrumbs(&mut self) {
        let previous_count = self.breadcrumbs.len();
        self.breadcrumbs = Default::default();
        sentry_debug!("[Scope] Cleared {} breadcrumbs", previous_count);
    }

    /// The recorded breadcrumbs, oldest first.
    pub fn breadcrumbs(&self) -> impl Iterator<Item = &Breadcrumb> {
        self.breadcrumbs.iter()
    }

    /// Sets a level override.
    pub fn set_level(&mut self, level: Option<Level>) {
        match (&self.level, &level) {
            (None, Some(new_level)) => {
                sentry_debug!("[Scope] Setting level override: {:?}", new_level)
            }
            (Some(old_level), Some(new_level)) if old_level != new_level => {
                sentry_debug!("[Scope] Changing level override: {:?} -> {:?}", old_level, new_level)
            }
            (Some(_), None) => sentry_debug!("[Scope] Removing level override"),
            _ => {}
        }
        self.level = level;
    }

    /// The level override, if any.
    pub fn level(&self) -> Option<Level> {
        self.level
    }

    /// Sets the fingerprint.
    pub fn set_fingerprint(&mut self, fingerprint: Option<&[&str]>) {
        if let Some(fp) = fingerprint {
            sentry_debug!("[Scope] Setting fingerprint: {:?}", fp);
        } else {
            sentry_debug!("[Scope] Removing fingerprint");
        }
        self.fingerprint = fingerprint.map(|fp| fp.iter().map(|s| (*s).to_owned()).collect());
    }

    /// Sets the transaction name of events captured in this scope.
    pub fn set_transaction(&mut self, transaction: Option<&str>) {
        self.transaction = transaction.map(Arc::from);
        if let (Some(name), Some(TransactionOrSpan::Transaction(trx))) =
            (transaction, self.span.as_ref())
        {
            trx.set_name(name);
            sentry_debug!("[Scope] Updated active transaction name: {}", name);
        }
    }

    /// Sets the user for the current scope.
    pub fn set_user(&mut self, user: Option<User>) {
        match (&self.user, &user) {
            (None, Some(new_user)) => sentry_debug!("[Scope] Setting user: id={:?}", new_user.id),
            (Some(_), Some(new_user)) => sentry_debug!("[Scope] Updating user: id={:?}", new_user.id),
            (Some(_), None) => sentry_debug!("[Scope] Removing user"),
            _ => {}
        }
        self.user = user.map(Arc::new);
    }

    /// Retrieves the user of the current scope.
    pub fn user(&self) -> Option<&User> {
        self.user.as_deref()
    }

    /// Sets a tag to a specific value.
    pub fn set_tag<V: ToString>(&mut self, key: &str, value: V) {
        let value = value.to_string();
        sentry_debug!("[Scope] Setting tag: {} = {}", key, value);
        Arc::make_mut(&mut self.tags).insert(key.to_string(), value);
    }

    /// Removes a tag.
    ///
    /// If the tag is not set, does nothing.
    pub fn remove_tag(&mut self, key: &str) {
        if Arc::make_mut(&mut self.tags).remove(key).is_some() {
            sentry_debug!("[Scope] Removed tag: {}", key);
        }
    }

    /// Looks up a tag.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Sets a context for a key.
    pub fn set_context<C: Into<Context>>(&mut self, key: &str, value: C) {
        sentry_debug!("[Scope] Setting context: {}", key);
        Arc::make_mut(&mut self.contexts).insert(key.to_string(), value.into());
    }

    /// Removes a context for a key.
    pub fn remove_context(&mut self, key: &str) {
        if Arc::make_mut(&mut self.contexts).remove(key).is_some() {
            sentry_debug!("[Scope] Removed context: {}", key);
        }
    }

    /// Looks up a context.
    pub fn context(&self, key: &str) -> Option<&Context> {
        self.contexts.get(key)
    }

    /// Sets a extra to a specific value.
    pub fn set_extra(&mut self, key: &str, value: Value) {
        sentry_debug!("[Scope] Setting extra: {} = {:?}", key, value);
        Arc::make_mut(&mut self.extra).insert(key.to_string(), value);
    }

    /// Removes a extra.
    pub fn remove_extra(&mut self, key: &str) {
        if Arc::make_mut(&mut self.extra).remove(key).is_some() {
            sentry_debug!("[Scope] Removed extra: {}", key);
        }
    }

    /// Looks up an extra value.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Add an event processor to the scope.
    ///
    /// Processors run in the order they were added.
    pub fn add_event_processor<F>(&mut self, f: F)
    where
        F: Fn(Event, &EventHint) -> Option<Event> + Send + Sync + 'static,
    {
        self.add_processor(Arc::new(f));
    }

    /// Add an already shared [`EventProcessor`] to the scope.
    pub fn add_processor(&mut self, processor: Arc<dyn EventProcessor>) {
        Arc::make_mut(&mut self.event_processors).push(processor);
        sentry_debug!(
            "[Scope] Added event processor (total: {})",
            self.event_processors.len()
        );
    }

    /// Set the given [`TransactionOrSpan`] as the active span for this scope.
    pub fn set_span(&mut self, span: Option<TransactionOrSpan>) {
        match (self.span.as_ref(), &span) {
            (None, Some(_)) => sentry_debug!("[Scope] Setting active span"),
            (Some(_), Some(_)) => sentry_debug!("[Scope] Replacing active span"),
            (Some(_), None) => sentry_debug!("[Scope] Removing active span"),
            _ => {}
        }
        self.span = Arc::new(span);
    }

    /// Returns the currently active span.
    pub fn get_span(&self) -> Option<TransactionOrSpan> {
        self.span.as_ref().clone()
    }

    /// Replaces the trace used while no span is active.
    pub fn set_propagation_context(&mut self, propagation_context: PropagationContext) {
        self.propagation_context = propagation_context;
    }

    /// The trace used while no span is active.
    pub fn propagation_context(&self) -> &PropagationContext {
        &self.propagation_context
    }

    /// Returns the headers needed for distributed tracing.
    pub fn iter_trace_propagation_headers(&self) -> TraceHeadersIter {
        match self.span.as_ref() {
            Some(span) => span.iter_headers(),
            None => self.propagation_context.iter_headers(),
        }
    }

    /// Applies the contained scoped data to fill an event.
    ///
    /// Values already present on the event win over the scope's, except for
    /// the level override.  Afterwards every event processor runs in order;
    /// the first one returning `None` drops the event and stops the chain.
    pub fn apply_to_event(&self, mut event: Event, hint: &EventHint) -> Option<Event> {
        sentry_debug!("[Scope] Applying scope to event {}", event.event_id);

        if let Some(level) = self.level {
            event.level = Some(level);
        }

        if let Some(fp) = self.fingerprint.as_deref().filter(|fp| !fp.is_empty()) {
            event.fingerprint.extend(fp.iter().cloned());
        }

        for (key, value) in self.tags.iter() {
            event.tags.entry(key.clone()).or_insert_with(|| value.clone());
        }

        for (key, value) in self.extra.iter() {
            if !event.extra.contains_key(key) {
                event.extra.insert(key.clone(), value.clone());
            }
        }

        for (key, value) in self.contexts.iter() {
            event
                .contexts
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        if let Some(user) = self.user.as_deref() {
            match event.user.as_mut() {
                Some(existing) => existing.merge(user),
                None => event.user = Some(user.clone()),
            }
        }

        if !self.breadcrumbs.is_empty() {
            event.breadcrumbs.extend(self.breadcrumbs.iter().cloned());
        }

        if event.transaction.is_none() {
            if let Some(txn) = self.transaction.as_deref() {
                event.transaction = Some(txn.to_owned());
            }
        }

        match self.span.as_ref() {
            Some(span) => span.apply_to_event(&mut event),
            None => self.propagation_context.apply_to_event(&mut event),
        }

        for (i, processor) in self.event_processors.iter().enumerate() {
            let id = event.event_id;
            event = match processor.process_event(event, hint) {
                Some(event) => event,
                None => {
                    sentry_debug!("[Scope] Event processor {} dropped event {}", i + 1, id);
                    return None;
                }
            }
        }

        Some(event)
    }

    /// Applies the contained scoped data to a log, setting the `trace_id` and certain default
    /// attributes.
    pub fn apply_to_log(&self, log: &mut Log, send_default_pii: bool) {
        match self.span.as_ref() {
            Some(span) => {
                let context = span.get_trace_context();
                log.trace_id = Some(context.trace_id);
                log.attributes
                    .entry("sentry.trace.parent_span_id".to_owned())
                    .or_insert_with(|| LogAttribute::from(context.span_id.to_string()));
            }
            None => log.trace_id = Some(self.propagation_context.trace_id),
        }

        if !send_default_pii {
            return;
        }
        if let Some(user) = self.user.as_deref() {
            let fields = [
                ("user.id", &user.id),
                ("user.name", &user.username),
                ("user.email", &user.email),
            ];
            for (key, value) in fields {
                if let Some(value) = value {
                    log.attributes
                        .entry(key.to_owned())
                        .or_insert_with(|| LogAttribute::from(value.as_str()));
                }
            }
        }
    }

    /// Links a metric to the active trace.
    pub fn apply_to_metric(&self, metric: &mut Metric) {
        metric.trace_id = Some(match self.span.as_ref() {
            Some(span) => span.trace_id(),
            None => self.propagation_context.trace_id,
        });
    }

    /// Layers `other` on top of this scope.
    ///
    /// Maps are unioned with `other` winning, breadcrumbs and processors of
    /// `other` come after the ones of `self`, everything else is taken from
    /// `other` when it is set there.
    pub(crate) fn merge(&mut self, other: &Scope) {
        if other.level.is_some() {
            self.level = other.level;
        }
        if other.fingerprint.is_some() {
            self.fingerprint.clone_from(&other.fingerprint);
        }
        if other.transaction.is_some() {
            self.transaction.clone_from(&other.transaction);
        }
        if other.user.is_some() {
            self.user.clone_from(&other.user);
        }
        if !other.breadcrumbs.is_empty() {
            Arc::make_mut(&mut self.breadcrumbs).extend(other.breadcrumbs.iter().cloned());
        }
        if !other.extra.is_empty() {
            let extra = Arc::make_mut(&mut self.extra);
            for (key, value) in other.extra.iter() {
                extra.insert(key.clone(), value.clone());
            }
        }
        if !other.tags.is_empty() {
            Arc::make_mut(&mut self.tags)
                .extend(other.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if !other.contexts.is_empty() {
            Arc::make_mut(&mut self.contexts)
                .extend(other.contexts.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if !other.event_processors.is_empty() {
            Arc::make_mut(&mut self.event_processors)
                .extend(other.event_processors.iter().cloned());
        }
        if other.span.is_some() {
            self.span = other.span.clone();
        }
        self.propagation_context = other.propagation_context.clone();
        self.ty = ScopeType::Merged;
    }
}
