use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use httpdate::parse_http_date;

use super::Response;
use crate::protocol::EventType;
use crate::utils::unix_seconds;

/// Applied when a limit header is present but its delay cannot be parsed.
const DEFAULT_DELAY: u64 = 60;

/// Parses a delay in seconds, dropping any fraction.
fn parse_delay(value: &str) -> Option<u64> {
    let secs = value.parse::<f64>().ok()?;
    // float to int casts saturate
    (secs.is_finite() && secs >= 0.0).then(|| secs as u64)
}

/// The key of the limit that applies to every category.
const GLOBAL: &str = "all";

/// The only `metric_bucket` namespace whose limits apply to trace metrics.
const METRICS_NAMESPACE: &str = "custom";

/// The Category of payload that a Rate Limit refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RateLimitingCategory {
    /// Rate Limit for any kind of payload.
    Any,
    /// Rate Limit pertaining to Errors.
    Error,
    /// Rate Limit pertaining to Transactions.
    Transaction,
    /// Rate Limit pertaining to Monitor Check-ins.
    Monitor,
    /// Rate Limit pertaining to Logs.
    LogItem,
    /// Rate Limit pertaining to Metrics.
    MetricBucket,
    /// Rate Limit pertaining to Profiles.
    Profile,
    /// Rate Limit pertaining to Profile Chunks.
    ProfileChunk,
    /// Rate Limit pertaining to Attachments.
    Attachment,
}

impl RateLimitingCategory {
    /// The category name used in the `X-Sentry-Rate-Limits` header.
    pub fn as_str(self) -> &'static str {
        match self {
            RateLimitingCategory::Any => GLOBAL,
            RateLimitingCategory::Error => "error",
            RateLimitingCategory::Transaction => "transaction",
            RateLimitingCategory::Monitor => "monitor",
            RateLimitingCategory::LogItem => "log_item",
            RateLimitingCategory::MetricBucket => "metric_bucket",
            RateLimitingCategory::Profile => "profile",
            RateLimitingCategory::ProfileChunk => "profile_chunk",
            RateLimitingCategory::Attachment => "attachment",
        }
    }
}

impl From<EventType> for RateLimitingCategory {
    fn from(ty: EventType) -> Self {
        match ty {
            EventType::Event => RateLimitingCategory::Error,
            EventType::Transaction => RateLimitingCategory::Transaction,
            EventType::CheckIn => RateLimitingCategory::Monitor,
            EventType::Log => RateLimitingCategory::LogItem,
            EventType::Metric => RateLimitingCategory::MetricBucket,
            EventType::Profile => RateLimitingCategory::Profile,
            EventType::ProfileChunk => RateLimitingCategory::ProfileChunk,
            EventType::Attachment => RateLimitingCategory::Attachment,
        }
    }
}

/// A Utility that helps with rate limiting sentry requests.
///
/// Limits are kept as unix-second deadlines per category name, `"all"` being
/// the global one.  A category is limited while the later of its own and the
/// global deadline lies in the future.
#[derive(Debug, Default, Clone)]
pub struct RateLimiter {
    limits: HashMap<String, u64>,
}

impl RateLimiter {
    /// Create a new RateLimiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the limits from the headers of a response.
    ///
    /// `X-Sentry-Rate-Limits` takes precedence; `Retry-After` is only
    /// looked at when it is absent.
    pub fn handle_response(&mut self, response: &Response) {
        self.handle_response_at(response, SystemTime::now());
    }

    /// Like [`handle_response`](Self::handle_response) with an explicit
    /// current time.
    pub fn handle_response_at(&mut self, response: &Response, now: SystemTime) {
        if let Some(header) = response.header("x-sentry-rate-limits") {
            self.update_from_sentry_header(header, now);
        } else if let Some(header) = response.header("retry-after") {
            self.update_from_retry_after(header, now);
        }
    }

    /// Updates the RateLimiter with information from a `Retry-After` header.
    ///
    /// The header is either a number of seconds, fractions being cut off,
    /// or an HTTP date.  Anything else limits everything for the default
    /// delay.
    pub fn update_from_retry_after(&mut self, header: &str, now: SystemTime) {
        let header = header.trim();
        let delay = match parse_delay(header) {
            Some(delay) => delay,
            None => parse_http_date(header)
                .ok()
                .and_then(|until| until.duration_since(now).ok())
                .map(|left| left.as_secs())
                .unwrap_or(DEFAULT_DELAY),
        };

        log::warn!(
            target: "sentry",
            "Rate limited: all categories for {} seconds",
            delay
        );
        self.limits
            .insert(GLOBAL.to_owned(), unix_seconds(now).saturating_add(delay));
    }

    /// Updates the RateLimiter with information from a `X-Sentry-Rate-Limits` header.
    pub fn update_from_sentry_header(&mut self, header: &str, now: SystemTime) {
        // <rate-limit> = (<group>,)+
        // <group> = <time>:(<category>;)*:<scope>(:<reason>(:<namespaces>)?)?

        for group in header.split(',') {
            let mut parts = group.trim().splitn(5, ':');
            let Some(delay) = parts.next().filter(|delay| !delay.is_empty()) else {
                continue;
            };
            let delay = parse_delay(delay).unwrap_or(DEFAULT_DELAY);
            let categories = parts.next().unwrap_or_default();
            let _scope = parts.next();
            let _reason = parts.next();
            let namespaces = parts.next().unwrap_or_default();

            let deadline = unix_seconds(now).saturating_add(delay);

            if categories.is_empty() {
                log::warn!(target: "sentry", "Rate limited: all categories for {} seconds", delay);
                self.limits.insert(GLOBAL.to_owned(), deadline);
                continue;
            }

            for category in categories.split(';').filter(|c| !c.is_empty()) {
                if category == RateLimitingCategory::MetricBucket.as_str()
                    && !namespaces.is_empty()
                    && !namespaces.split(';').any(|ns| ns == METRICS_NAMESPACE)
                {
                    continue;
                }
                log::warn!(
                    target: "sentry",
                    "Rate limited: {} for {} seconds",
                    category,
                    delay
                );
                self.limits.insert(category.to_owned(), deadline);
            }
        }
    }

    /// Whether events of the given category are currently limited.
    pub fn is_rate_limited(&self, category: impl Into<RateLimitingCategory>) -> bool {
        self.is_rate_limited_at(category, SystemTime::now())
    }

    /// Like [`is_rate_limited`](Self::is_rate_limited) with an explicit
    /// current time.
    pub fn is_rate_limited_at(
        &self,
        category: impl Into<RateLimitingCategory>,
        now: SystemTime,
    ) -> bool {
        self.disabled_until(category.into()) > unix_seconds(now)
    }

    /// Query the RateLimiter for how long a category stays disabled.
    pub fn is_disabled(&self, category: RateLimitingCategory) -> Option<Duration> {
        let now = unix_seconds(SystemTime::now());
        let until = self.disabled_until(category);
        (until > now).then(|| Duration::from_secs(until - now))
    }

    fn disabled_until(&self, category: RateLimitingCategory) -> u64 {
        let global = self.limits.get(GLOBAL).copied().unwrap_or(0);
        let own = self.limits.get(category.as_str()).copied().unwrap_or(0);
        global.max(own)
    }
}
