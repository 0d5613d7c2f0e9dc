use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use crate::protocol::{
    self, DynamicSamplingContext, Event, Profile, SpanId, SpanStatus, TraceContext, TraceId,
    Value,
};
use crate::{Client, Hub};

const MAX_SPANS: usize = 1_000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// global API:

/// Start a new Performance Monitoring Transaction.
///
/// The transaction needs to be explicitly finished via [`Transaction::finish`],
/// otherwise it will be discarded.
/// The transaction itself also represents the root span in the span hierarchy.
/// Child spans can be started with the [`Transaction::start_child`] method.
pub fn start_transaction(ctx: TransactionContext) -> Transaction {
    let client = Hub::with_active(|hub| hub.client());
    Transaction::new(client, ctx)
}

// Hub API:

impl Hub {
    /// Start a new Performance Monitoring Transaction.
    ///
    /// See the global [`start_transaction`] for more documentation.
    pub fn start_transaction(&self, ctx: TransactionContext) -> Transaction {
        Transaction::new(self.client(), ctx)
    }
}

// "Context" Types:

/// The Transaction Context used to start a new Performance Monitoring Transaction.
///
/// The Transaction Context defines the metadata for a Performance Monitoring
/// Transaction, and also the connection point for distributed tracing.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    name: String,
    op: String,
    trace_id: TraceId,
    parent_span_id: Option<SpanId>,
    sampled: Option<bool>,
    dynamic_sampling_context: Option<DynamicSamplingContext>,
}

impl TransactionContext {
    /// Creates a new Transaction Context with the given `name` and `op`.
    ///
    /// See also the [`TransactionContext::continue_from_headers`] function that
    /// can be used for distributed tracing.
    #[must_use = "this must be used with `start_transaction`"]
    pub fn new(name: &str, op: &str) -> Self {
        Self::continue_from_headers(name, op, vec![])
    }

    /// Creates a new Transaction Context based on the distributed tracing `headers`.
    ///
    /// A `sentry-trace` header associates the transaction with an upstream
    /// trace, a `baggage` header carries the upstream dynamic sampling context.
    #[must_use = "this must be used with `start_transaction`"]
    pub fn continue_from_headers<'a, I: IntoIterator<Item = (&'a str, &'a str)>>(
        name: &str,
        op: &str,
        headers: I,
    ) -> Self {
        let propagation = PropagationContext::from_headers(headers);
        let continued = propagation.parent_span_id.is_some();

        Self {
            name: name.into(),
            op: op.into(),
            trace_id: propagation.trace_id,
            parent_span_id: propagation.parent_span_id,
            sampled: propagation.sampled,
            dynamic_sampling_context: propagation
                .dynamic_sampling_context
                .filter(|_| continued),
        }
    }

    /// Creates a new Transaction Context based on an existing Span.
    ///
    /// This should be used when an independent computation is spawned on another
    /// thread and should be connected to the calling thread via a distributed
    /// tracing transaction.
    pub fn continue_from_span(name: &str, op: &str, span: Option<TransactionOrSpan>) -> Self {
        let Some(span) = span else {
            return Self::new(name, op);
        };

        let (trace_id, parent_span_id, sampled, dsc) = match span {
            TransactionOrSpan::Transaction(transaction) => {
                let inner = lock(&transaction.inner);
                (
                    inner.context.trace_id,
                    inner.context.span_id,
                    inner.sampled,
                    inner.dynamic_sampling_context.clone(),
                )
            }
            TransactionOrSpan::Span(span) => {
                let dsc = lock(&span.transaction).dynamic_sampling_context.clone();
                let inner = lock(&span.span);
                (inner.trace_id, inner.span_id, span.sampled, dsc)
            }
        };

        Self {
            name: name.into(),
            op: op.into(),
            trace_id,
            parent_span_id: Some(parent_span_id),
            sampled: Some(sampled),
            dynamic_sampling_context: Some(dsc),
        }
    }

    /// Set the sampling decision for this Transaction.
    ///
    /// This can be either an explicit boolean flag, or [`None`], which will fall
    /// back to use the configured `traces_sample_rate` option.
    pub fn set_sampled(&mut self, sampled: impl Into<Option<bool>>) {
        self.sampled = sampled.into();
    }

    /// The sampling decision, if one was made upstream or set explicitly.
    pub fn sampled(&self) -> Option<bool> {
        self.sampled
    }

    /// The name of the transaction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The operation of the transaction.
    pub fn operation(&self) -> &str {
        &self.op
    }

    /// The trace the transaction belongs to.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The upstream span, if the trace was continued.
    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.parent_span_id
    }
}

/// The trace state of a scope that has no active span.
///
/// Errors captured outside of any transaction are still linked to a trace:
/// either one continued from incoming headers, or a random one that lives as
/// long as the scope.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationContext {
    /// The trace id.
    pub trace_id: TraceId,
    /// The span id events of this scope are attributed to.
    pub span_id: SpanId,
    /// The upstream span when continued from headers.
    pub parent_span_id: Option<SpanId>,
    /// The upstream sampling decision.
    pub sampled: Option<bool>,
    /// The frozen upstream dynamic sampling context.
    pub dynamic_sampling_context: Option<DynamicSamplingContext>,
}

impl Default for PropagationContext {
    fn default() -> Self {
        PropagationContext {
            trace_id: TraceId::default(),
            span_id: SpanId::default(),
            parent_span_id: None,
            sampled: None,
            dynamic_sampling_context: None,
        }
    }
}

impl PropagationContext {
    /// Creates a fresh context with a random trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues the trace announced by `sentry-trace` and `baggage` headers.
    ///
    /// Header names are matched case-insensitively.  Without a valid
    /// `sentry-trace` header a fresh trace is started.
    pub fn from_headers<'a, I: IntoIterator<Item = (&'a str, &'a str)>>(headers: I) -> Self {
        let mut trace = None;
        let mut baggage = None;
        for (k, v) in headers.into_iter() {
            if k.eq_ignore_ascii_case("sentry-trace") {
                trace = parse_sentry_trace(v);
            } else if k.eq_ignore_ascii_case("baggage") {
                baggage = Some(DynamicSamplingContext::from_baggage(v));
            }
        }

        let Some(trace) = trace else {
            return Self::default();
        };

        PropagationContext {
            trace_id: trace.trace_id,
            span_id: SpanId::default(),
            parent_span_id: Some(trace.span_id),
            sampled: trace.sampled,
            // an upstream without baggage still froze the sampling context
            dynamic_sampling_context: Some(baggage.unwrap_or_else(|| {
                let mut dsc = DynamicSamplingContext::new();
                dsc.freeze();
                dsc
            })),
        }
    }

    /// The `trace` context of events captured under this context.
    pub fn trace_context(&self) -> TraceContext {
        TraceContext {
            trace_id: self.trace_id,
            span_id: self.span_id,
            parent_span_id: self.parent_span_id,
            ..Default::default()
        }
    }

    /// The `sentry-trace` value to send downstream.
    pub fn sentry_trace(&self) -> SentryTrace {
        SentryTrace::new(self.trace_id, self.span_id, self.sampled)
    }

    /// Returns the headers needed for distributed tracing.
    pub fn iter_headers(&self) -> TraceHeadersIter {
        TraceHeadersIter::new(self.sentry_trace(), self.dynamic_sampling_context.as_ref())
    }

    pub(crate) fn apply_to_event(&self, event: &mut Event) {
        event
            .contexts
            .entry("trace".into())
            .or_insert_with(|| self.trace_context().into());
        if event.dynamic_sampling_context.is_none() {
            if let Some(dsc) = self.dynamic_sampling_context.as_ref() {
                if dsc.has_entries() {
                    event.dynamic_sampling_context = Some(dsc.clone());
                }
            }
        }
    }
}

// global API types:

/// A wrapper that groups a [`Transaction`] and a [`Span`] together.
#[derive(Clone, Debug)]
pub enum TransactionOrSpan {
    /// A [`Transaction`].
    Transaction(Transaction),
    /// A [`Span`].
    Span(Span),
}

impl From<Transaction> for TransactionOrSpan {
    fn from(transaction: Transaction) -> Self {
        Self::Transaction(transaction)
    }
}

impl From<Span> for TransactionOrSpan {
    fn from(span: Span) -> Self {
        Self::Span(span)
    }
}

impl TransactionOrSpan {
    /// Set some extra information to be sent with this Transaction/Span.
    pub fn set_data(&self, key: &str, value: Value) {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.set_data(key, value),
            TransactionOrSpan::Span(span) => span.set_data(key, value),
        }
    }

    /// Get the status of the Transaction/Span.
    pub fn get_status(&self) -> Option<SpanStatus> {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.get_status(),
            TransactionOrSpan::Span(span) => span.get_status(),
        }
    }

    /// Set the status of the Transaction/Span.
    pub fn set_status(&self, status: SpanStatus) {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.set_status(status),
            TransactionOrSpan::Span(span) => span.set_status(status),
        }
    }

    /// Whether the owning transaction was sampled.
    pub fn is_sampled(&self) -> bool {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.is_sampled(),
            TransactionOrSpan::Span(span) => span.is_sampled(),
        }
    }

    /// The trace this Transaction/Span belongs to.
    pub fn trace_id(&self) -> TraceId {
        self.get_trace_context().trace_id
    }

    /// The id of this Transaction/Span.
    pub fn span_id(&self) -> SpanId {
        self.get_trace_context().span_id
    }

    /// The trace context describing this Transaction/Span.
    pub fn get_trace_context(&self) -> TraceContext {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.get_trace_context(),
            TransactionOrSpan::Span(span) => span.get_trace_context(),
        }
    }

    /// Returns the headers needed for distributed tracing.
    pub fn iter_headers(&self) -> TraceHeadersIter {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.iter_headers(),
            TransactionOrSpan::Span(span) => span.iter_headers(),
        }
    }

    /// Starts a new child Span with the given `op` and `description`.
    ///
    /// The span must be explicitly finished via [`Span::finish`], as it will
    /// otherwise not be sent to Sentry.
    #[must_use = "a span must be explicitly closed via `finish()`"]
    pub fn start_child(&self, op: &str, description: &str) -> Span {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.start_child(op, description),
            TransactionOrSpan::Span(span) => span.start_child(op, description),
        }
    }

    pub(crate) fn apply_to_event(&self, event: &mut Event) {
        if !event.contexts.contains_key("trace") {
            event
                .contexts
                .insert("trace".into(), self.get_trace_context().into());
        }
        if event.dynamic_sampling_context.is_none() {
            let transaction = match self {
                TransactionOrSpan::Transaction(transaction) => &transaction.inner,
                TransactionOrSpan::Span(span) => &span.transaction,
            };
            let dsc = lock(transaction).dynamic_sampling_context.clone();
            if dsc.has_entries() {
                event.dynamic_sampling_context = Some(dsc);
            }
        }
    }

    /// Finishes the Transaction/Span.
    ///
    /// This records the end timestamp and either sends the inner [`Transaction`]
    /// directly to Sentry, or adds the [`Span`] to its transaction.
    pub fn finish(self) {
        match self {
            TransactionOrSpan::Transaction(transaction) => transaction.finish(),
            TransactionOrSpan::Span(span) => span.finish(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct TransactionInner {
    client: Option<Arc<Client>>,
    sampled: bool,
    context: TraceContext,
    dynamic_sampling_context: DynamicSamplingContext,
    pub(crate) transaction: Option<Event>,
}

type TransactionArc = Arc<Mutex<TransactionInner>>;

/// A running Performance Monitoring Transaction.
///
/// The transaction needs to be explicitly finished via [`Transaction::finish`],
/// otherwise neither the transaction nor any of its child spans will be sent
/// to Sentry.
#[derive(Clone, Debug)]
pub struct Transaction {
    pub(crate) inner: TransactionArc,
}

impl Transaction {
    fn new(mut client: Option<Arc<Client>>, ctx: TransactionContext) -> Self {
        let context = TraceContext {
            trace_id: ctx.trace_id,
            parent_span_id: ctx.parent_span_id,
            op: Some(ctx.op),
            ..Default::default()
        };

        let (sampled, mut transaction) = match client.as_ref() {
            Some(client) => (
                ctx.sampled.unwrap_or_else(|| {
                    client.sample_should_send(client.options().traces_sample_rate)
                }),
                Some(Event {
                    transaction: Some(ctx.name.clone()),
                    start_timestamp: Some(SystemTime::now()),
                    ..Event::transaction()
                }),
            ),
            None => (ctx.sampled.unwrap_or(false), None),
        };

        let dynamic_sampling_context = match ctx.dynamic_sampling_context {
            Some(dsc) if dsc.is_frozen() => dsc,
            _ => {
                let mut dsc = DynamicSamplingContext::new();
                dsc.set("trace_id", context.trace_id.to_string());
                if let Some(client) = client.as_ref() {
                    let options = client.options();
                    if let Some(dsn) = options.dsn.as_ref() {
                        dsc.set("public_key", dsn.public_key());
                    }
                    if let Some(release) = options.release.as_deref() {
                        dsc.set("release", release);
                    }
                    if let Some(environment) = options.environment.as_deref() {
                        dsc.set("environment", environment);
                    }
                    dsc.set("sample_rate", options.traces_sample_rate.to_string());
                }
                dsc.set("transaction", ctx.name);
                dsc.set("sampled", sampled.to_string());
                dsc
            }
        };

        // throw away the transaction here, which means there is nothing to send
        // on `finish`.
        if !sampled {
            transaction = None;
            client = None;
        }

        Self {
            inner: Arc::new(Mutex::new(TransactionInner {
                client,
                sampled,
                context,
                dynamic_sampling_context,
                transaction,
            })),
        }
    }

    /// Set some extra information to be sent with this Transaction.
    pub fn set_data(&self, key: &str, value: Value) {
        let mut inner = lock(&self.inner);
        if let Some(transaction) = inner.transaction.as_mut() {
            transaction.extra.insert(key.into(), value);
        }
    }

    /// Set a tag to be sent with this Transaction.
    pub fn set_tag<V: ToString>(&self, key: &str, value: V) {
        let mut inner = lock(&self.inner);
        if let Some(transaction) = inner.transaction.as_mut() {
            transaction.tags.insert(key.into(), value.to_string());
        }
    }

    /// Renames the Transaction.
    pub fn set_name(&self, name: &str) {
        let mut inner = lock(&self.inner);
        if let Some(transaction) = inner.transaction.as_mut() {
            transaction.transaction = Some(name.into());
        }
    }

    /// Attaches a profile recorded while the Transaction was running.
    pub fn set_profile(&self, profile: Profile) {
        let mut inner = lock(&self.inner);
        if let Some(transaction) = inner.transaction.as_mut() {
            transaction.profile = Some(profile);
        }
    }

    /// Get the status of the Transaction.
    pub fn get_status(&self) -> Option<SpanStatus> {
        lock(&self.inner).context.status
    }

    /// Set the status of the Transaction.
    pub fn set_status(&self, status: SpanStatus) {
        lock(&self.inner).context.status = Some(status);
    }

    /// Whether the Transaction was sampled and will be sent on `finish`.
    pub fn is_sampled(&self) -> bool {
        lock(&self.inner).sampled
    }

    /// The trace context describing this Transaction.
    pub fn get_trace_context(&self) -> TraceContext {
        lock(&self.inner).context.clone()
    }

    /// Returns the headers needed for distributed tracing.
    pub fn iter_headers(&self) -> TraceHeadersIter {
        let inner = lock(&self.inner);
        let trace = SentryTrace::new(
            inner.context.trace_id,
            inner.context.span_id,
            Some(inner.sampled),
        );
        TraceHeadersIter::new(trace, Some(&inner.dynamic_sampling_context))
    }

    /// Finishes the Transaction.
    ///
    /// This records the end timestamp and sends the transaction together with
    /// all finished child spans to Sentry.
    pub fn finish(self) {
        let mut inner = lock(&self.inner);
        let Some(mut transaction) = inner.transaction.take() else {
            return;
        };
        let Some(client) = inner.client.take() else {
            return;
        };

        transaction.timestamp = SystemTime::now();
        transaction
            .contexts
            .insert("trace".into(), inner.context.clone().into());
        let mut dsc = inner.dynamic_sampling_context.clone();
        dsc.freeze();
        transaction.dynamic_sampling_context = Some(dsc);
        drop(inner);

        sentry_debug!(
            "[Transaction] Finishing {} with {} spans",
            transaction.event_id,
            transaction.spans.len()
        );
        client.capture_event(transaction, None, None);
    }

    /// Starts a new child Span with the given `op` and `description`.
    ///
    /// The span must be explicitly finished via [`Span::finish`].
    #[must_use = "a span must be explicitly closed via `finish()`"]
    pub fn start_child(&self, op: &str, description: &str) -> Span {
        let inner = lock(&self.inner);
        Span::child_of(
            Arc::clone(&self.inner),
            inner.sampled,
            inner.context.trace_id,
            inner.context.span_id,
            op,
            description,
        )
    }
}

/// A running Performance Monitoring Span.
///
/// The span needs to be explicitly finished via [`Span::finish`], otherwise it
/// will not be sent to Sentry.  A span only knows its parent by id.
#[derive(Clone, Debug)]
pub struct Span {
    pub(crate) transaction: TransactionArc,
    sampled: bool,
    span: SpanArc,
}

type SpanArc = Arc<Mutex<protocol::Span>>;

impl Span {
    fn child_of(
        transaction: TransactionArc,
        sampled: bool,
        trace_id: TraceId,
        parent_span_id: SpanId,
        op: &str,
        description: &str,
    ) -> Span {
        let span = protocol::Span {
            trace_id,
            parent_span_id: Some(parent_span_id),
            op: Some(op.into()),
            description: (!description.is_empty()).then(|| description.into()),
            ..Default::default()
        };
        Span {
            transaction,
            sampled,
            span: Arc::new(Mutex::new(span)),
        }
    }

    /// Set some extra information to be sent with this Span.
    pub fn set_data(&self, key: &str, value: Value) {
        lock(&self.span).data.insert(key.into(), value);
    }

    /// Set a tag to be sent with this Span.
    pub fn set_tag<V: ToString>(&self, key: &str, value: V) {
        lock(&self.span).tags.insert(key.into(), value.to_string());
    }

    /// Get the status of the Span.
    pub fn get_status(&self) -> Option<SpanStatus> {
        lock(&self.span).status
    }

    /// Set the status of the Span.
    pub fn set_status(&self, status: SpanStatus) {
        lock(&self.span).status = Some(status);
    }

    /// Whether the owning transaction was sampled.
    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    /// The trace context describing this Span.
    pub fn get_trace_context(&self) -> TraceContext {
        let span = lock(&self.span);
        TraceContext {
            span_id: span.span_id,
            trace_id: span.trace_id,
            parent_span_id: span.parent_span_id,
            op: span.op.clone(),
            description: span.description.clone(),
            status: span.status,
            ..Default::default()
        }
    }

    /// Returns the headers needed for distributed tracing.
    pub fn iter_headers(&self) -> TraceHeadersIter {
        let trace = {
            let span = lock(&self.span);
            SentryTrace::new(span.trace_id, span.span_id, Some(self.sampled))
        };
        let inner = lock(&self.transaction);
        TraceHeadersIter::new(trace, Some(&inner.dynamic_sampling_context))
    }

    /// Finishes the Span.
    ///
    /// This will record the end timestamp and add the span to the transaction
    /// in which it was started.
    pub fn finish(self) {
        let mut span = lock(&self.span);
        if span.timestamp.is_some() {
            // the span was already finished
            return;
        }
        span.finish();
        let mut inner = lock(&self.transaction);
        if let Some(transaction) = inner.transaction.as_mut() {
            if transaction.spans.len() < MAX_SPANS {
                transaction.spans.push(span.clone());
            }
        }
    }

    /// Starts a new child Span with the given `op` and `description`.
    ///
    /// The span must be explicitly finished via [`Span::finish`].
    #[must_use = "a span must be explicitly closed via `finish()`"]
    pub fn start_child(&self, op: &str, description: &str) -> Span {
        let (trace_id, span_id) = {
            let span = lock(&self.span);
            (span.trace_id, span.span_id)
        };
        Span::child_of(
            self.transaction.clone(),
            self.sampled,
            trace_id,
            span_id,
            op,
            description,
        )
    }
}

/// An Iterator over HTTP header names and values needed for distributed tracing.
///
/// Yields the `sentry-trace` header, followed by `baggage` when there is a
/// dynamic sampling context to propagate.
pub struct TraceHeadersIter {
    sentry_trace: Option<String>,
    baggage: Option<String>,
}

impl TraceHeadersIter {
    fn new(trace: SentryTrace, dsc: Option<&DynamicSamplingContext>) -> Self {
        TraceHeadersIter {
            sentry_trace: Some(trace.to_string()),
            baggage: dsc.filter(|dsc| dsc.has_entries()).map(|dsc| dsc.to_string()),
        }
    }
}

impl Iterator for TraceHeadersIter {
    type Item = (&'static str, String);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(st) = self.sentry_trace.take() {
            return Some(("sentry-trace", st));
        }
        self.baggage.take().map(|baggage| ("baggage", baggage))
    }
}

/// The parsed value of a `sentry-trace` header: `traceid-spanid[-sampled]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentryTrace {
    trace_id: TraceId,
    span_id: SpanId,
    sampled: Option<bool>,
}

impl SentryTrace {
    /// Creates a new header value.
    pub fn new(trace_id: TraceId, span_id: SpanId, sampled: Option<bool>) -> Self {
        SentryTrace {
            trace_id,
            span_id,
            sampled,
        }
    }

    /// The trace id.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The id of the span that sent the header.
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// The sampling decision, if one was made.
    pub fn sampled(&self) -> Option<bool> {
        self.sampled
    }
}

/// Parses a `sentry-trace` header value.
pub fn parse_sentry_trace(header: &str) -> Option<SentryTrace> {
    let header = header.trim();
    let mut parts = header.splitn(3, '-');

    let trace_id = parts.next()?.parse().ok()?;
    let parent_span_id = parts.next()?.parse().ok()?;
    let parent_sampled = parts.next().and_then(|sampled| match sampled {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    });

    Some(SentryTrace::new(trace_id, parent_span_id, parent_sampled))
}

impl fmt::Display for SentryTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.trace_id, self.span_id)?;
        if let Some(sampled) = self.sampled {
            write!(f, "-{}", if sampled { '1' } else { '0' })?;
        }
        Ok(())
    }
}
