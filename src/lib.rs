//! This crate provides the event pipeline of a [Sentry] client: capturing
//! errors, messages and traces, enriching them with scoped context, and
//! delivering them as envelopes with rate limit awareness.
//!
//! # Core Concepts
//!
//! This crate follows the [Unified API] guidelines and is centered around
//! the concepts of [`Client`], [`Hub`] and [`Scope`], as well as the extension
//! points via the [`Integration`], [`EventProcessor`], [`Transport`] and
//! [`TransportFactory`] traits.
//!
//! An event travels through these stages:
//!
//! 1. application code mutates the current [`Scope`] (directly or via
//!    [`configure_scope`]),
//! 2. an error or message is captured on a [`Hub`],
//! 3. the [`Client`] bound to the hub applies the scope, the integrations and
//!    the `before_send` hooks,
//! 4. the [`PayloadSerializer`] turns the event into an envelope,
//! 5. the [`Transport`] sends it, consulting its
//!    [`RateLimiter`](transports::RateLimiter) before and after.
//!
//! Delivery failures never surface as errors: capture calls return the event
//! id on success and `None` otherwise.
//!
//! # Parallelism and Concurrency
//!
//! The main concurrency primitive is the [`Hub`]. In general, all concurrent
//! code needs to run with its own copy of a [`Hub`]. Even though the [`Hub`]
//! is internally synchronized, using it concurrently may lead to unexpected
//! results.
//!
//! ```rust
//! use sentry_pipeline::Hub;
//! use std::sync::Arc;
//!
//! let hub = Hub::current();
//! let result = std::thread::spawn(move || {
//!     let thread_hub = Arc::new(Hub::new_from_top(&hub));
//!     Hub::run(thread_hub, || 1_u32)
//! })
//! .join();
//!
//! assert_eq!(result.unwrap(), 1);
//! ```
//!
//! Units of work such as requests or jobs are best wrapped in a
//! [`RuntimeContextManager`], which also buffers their logs and metrics.
//!
//! # Logging
//!
//! Diagnostics of the pipeline itself, such as rate limit drops, failed
//! deliveries and runtime context teardown, go through the [`log`] facade
//! under the `sentry` target.  Any logger works:
//!
//! ```
//! let _ = pretty_env_logger::formatted_builder()
//!     .filter_module("sentry", log::LevelFilter::Warn)
//!     .try_init();
//! ```
//!
//! [`log`]: https://docs.rs/log
//!
//! # Features
//!
//! - `feature = "transport"` (default): Enables the reqwest based
//!   [`ReqwestHttpClient`](transports::ReqwestHttpClient).
//! - `feature = "test"`: Activates the [`test`] module, which can be used to
//!   write integration tests. It comes with a test transport which can capture
//!   all sent events for inspection.
//!
//! [Sentry]: https://sentry.io/
//! [Unified API]: https://develop.sentry.dev/sdk/unified-api/
//! [`test`]: test/index.html

#![doc(html_favicon_url = "https://sentry-brand.storage.googleapis.com/favicon.ico")]
#![doc(html_logo_url = "https://sentry-brand.storage.googleapis.com/sentry-glyph-black.png")]
#![cfg_attr(doc_cfg, feature(doc_cfg))]
#![warn(missing_docs)]

// macros; these need to be first to be used by other modules
#[macro_use]
mod macros;

mod api;
mod auth;
mod breadcrumbs;
mod client;
mod clientoptions;
mod constants;
mod defaults;
mod dsn;
mod envelope;
mod error;
mod eventprocessor;
mod hub;
mod hub_impl;
mod init;
mod intodsn;
mod logs;
mod metrics;
mod performance;
mod project_id;
mod runtime;
mod scope;
mod stack;

pub mod integrations;
pub mod protocol;
pub mod transports;
pub mod utils;

// public api or exports from this crate
pub use crate::api::*;
pub use crate::auth::{Auth, PROTOCOL_VERSION};
pub use crate::breadcrumbs::IntoBreadcrumbs;
pub use crate::client::Client;
pub use crate::clientoptions::{BeforeCallback, ClientOptions, OptionsError, MAX_BREADCRUMBS};
pub use crate::constants::{SDK_NAME, VERSION};
pub use crate::defaults::apply_defaults;
pub use crate::dsn::{Dsn, ParseDsnError, Scheme};
pub use crate::envelope::{EnvelopeError, PayloadSerializer};
pub use crate::error::{capture_error, event_from_error, exception_from_error};
pub use crate::eventprocessor::{EventHint, EventProcessor};
pub use crate::hub::Hub;
pub use crate::hub_impl::SwitchGuard;
pub use crate::init::{init, ClientInitGuard};
pub use crate::integrations::Integration;
pub use crate::intodsn::IntoDsn;
pub use crate::logs::LogsAggregator;
pub use crate::metrics::MetricsAggregator;
pub use crate::performance::*;
pub use crate::project_id::{ParseProjectIdError, ProjectId};
pub use crate::runtime::{
    ExecutionKeyResolver, ProcessKeyResolver, RuntimeContext, RuntimeContextManager,
    ThreadKeyResolver,
};
pub use crate::scope::{
    IsolationScopeGuard, Scope, ScopeManager, ScopeManagerGuard, ScopeType,
};
pub use crate::stack::ScopeGuard;
pub use crate::transports::{Transport, TransportFactory};


// public api from other crates
pub use uuid::Uuid;
