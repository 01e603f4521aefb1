//! Per-connection proxy pipeline.
//!
//! # Stages
//! ```text
//! raw bytes → Request::parse ─ invalid ──────────────────────────→ 400
//!                 │ GET: Connection header, request rules
//!                 │ GET + cache enabled: ResponseCache::lookup ─ hit ─┐
//!                 ▼                                                  │
//!            Origin::fetch → Response::parse                         │
//!                 │ valid: response rules, ResponseCache::store      │
//!                 ▼                                                  ▼
//!              encode ──────────────────────────────────────────→ client
//! ```
//!
//! Stages run strictly in this order; there are no retries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use bytes::Bytes;

use crate::cache::ResponseCache;
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::{Request, Response, BAD_REQUEST};
use crate::net::ConnectionId;
use crate::observability::metrics;
use crate::proxy::origin::{Origin, TcpOrigin};
use crate::rewrite::{ByteRewriteRule, RewriteError, RewriteRule, RewriteRules};

/// Request header carrying the client's copy date.
pub const IF_MODIFIED_SINCE: &str = "If-Modified-Since";

/// Owns the rewrite rules, toggles and cache shared by every connection.
pub struct ProxyController<O = TcpOrigin> {
    rules: ArcSwap<RewriteRules>,
    keep_alive: AtomicBool,
    use_cache: AtomicBool,
    cache: ResponseCache,
    origin: O,
}

impl<O: Origin> ProxyController<O> {
    /// A controller with no rules, keep-alive on and the cache off.
    pub fn new(origin: O) -> Self {
        Self {
            rules: ArcSwap::from_pointee(RewriteRules::new()),
            keep_alive: AtomicBool::new(true),
            use_cache: AtomicBool::new(false),
            cache: ResponseCache::new(),
            origin,
        }
    }

    /// A controller configured from `config`.
    pub fn from_config(config: &ProxyConfig, origin: O) -> Result<Self, RewriteError> {
        let controller = Self::new(origin);
        controller.apply_config(config)?;
        Ok(controller)
    }

    /// Replace rules and toggles with those in `config`.
    ///
    /// Nothing changes if any pattern fails to compile.
    pub fn apply_config(&self, config: &ProxyConfig) -> Result<(), RewriteError> {
        let rules = RewriteRules::from_config(&config.rewrite)?;
        self.replace_rules(rules);
        self.set_keep_alive(config.proxy.keep_alive);
        self.set_use_cache(config.proxy.use_cache);
        Ok(())
    }

    /// Append a rule applied to GET request lines.
    pub fn add_request_rule(
        &self,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<(), RewriteError> {
        let rule = RewriteRule::new(pattern, replacement)?;
        self.rules.rcu(|current| {
            let mut next = RewriteRules::clone(current);
            next.push_request(rule.clone());
            next
        });
        Ok(())
    }

    /// Append a rule applied to textual response bodies.
    pub fn add_response_rule(
        &self,
        pattern: &str,
        replacement: impl Into<Vec<u8>>,
    ) -> Result<(), RewriteError> {
        let rule = ByteRewriteRule::new(pattern, replacement)?;
        self.rules.rcu(|current| {
            let mut next = RewriteRules::clone(current);
            next.push_response(rule.clone());
            next
        });
        Ok(())
    }

    pub fn replace_rules(&self, rules: RewriteRules) {
        self.rules.store(Arc::new(rules));
    }

    /// Snapshot of the current rules.
    pub fn rules(&self) -> Arc<RewriteRules> {
        self.rules.load_full()
    }

    pub fn set_keep_alive(&self, keep_alive: bool) {
        self.keep_alive.store(keep_alive, Ordering::Relaxed);
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive.load(Ordering::Relaxed)
    }

    pub fn set_use_cache(&self, use_cache: bool) {
        self.use_cache.store(use_cache, Ordering::Relaxed);
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache.load(Ordering::Relaxed)
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Run one exchange and return the bytes to send back to the client.
    ///
    /// Only transport failures towards the origin are errors; the caller
    /// then drops the connection without replying.
    pub async fn handle(&self, raw: Bytes, id: ConnectionId) -> Result<Bytes, ProxyError> {
        let mut request = Request::parse(raw);
        if !request.is_valid() {
            metrics::record_bad_request();
            tracing::warn!(
                connection_id = %id,
                error = ?request.parse_error(),
                "The request was rejected"
            );
            return Ok(Bytes::from_static(BAD_REQUEST));
        }

        tracing::info!(connection_id = %id, line = request.line(), "Request received");

        // The cache is keyed on what the client asked for, before rewriting.
        let resource_key = request.resource_key().to_string();

        if request.method() == "GET" {
            match self.prepare_request(&mut request) {
                Ok(()) => tracing::debug!(
                    connection_id = %id,
                    line = request.line(),
                    host = request.host(),
                    "The request was rewritten"
                ),
                Err(e) => tracing::warn!(
                    connection_id = %id,
                    error = %e,
                    "Failed to rewrite the request"
                ),
            }

            if self.use_cache() {
                if let Some(cached) = self.query_cache(&request, &resource_key, id) {
                    return Ok(cached.encode());
                }
            }
        }

        let response = self.forward(&request, &resource_key, id).await?;
        Ok(response.encode())
    }

    /// Force the `Connection` header and apply the request rules.
    ///
    /// The header is set even when rewriting fails.
    pub fn prepare_request(&self, request: &mut Request) -> Result<(), RewriteError> {
        let connection = if self.keep_alive() {
            " keep-alive"
        } else {
            " close"
        };
        request.headers_mut().insert("Connection", connection);

        let result = request.rewrite(self.rules.load().request());
        metrics::record_rewrite("request", if result.is_ok() { "applied" } else { "failed" });
        result
    }

    /// Apply the response rules if the response is textual.
    ///
    /// Returns whether the body was rewritten.
    pub fn prepare_response(&self, response: &mut Response) -> Result<bool, RewriteError> {
        let result = response.rewrite(self.rules.load().response());
        let outcome = match result {
            Ok(true) => "applied",
            Ok(false) => "skipped",
            Err(_) => "failed",
        };
        metrics::record_rewrite("response", outcome);
        result
    }

    /// Look `request` up in the cache under `resource_key`.
    pub fn query_cache(
        &self,
        request: &Request,
        resource_key: &str,
        id: ConnectionId,
    ) -> Option<Arc<Response>> {
        let known_since = request.headers().get(IF_MODIFIED_SINCE);
        let hit = self.cache.lookup(resource_key, known_since);
        metrics::record_cache_lookup(hit.is_some());
        if hit.is_some() {
            tracing::info!(connection_id = %id, resource_key, "Requested page was retrieved from cache");
        }
        hit
    }

    /// Send `request` to its host and build the response for the client.
    ///
    /// A valid response is rewritten and then stored as delivered; an invalid
    /// one is relayed unchanged and not cached.
    pub async fn forward(
        &self,
        request: &Request,
        resource_key: &str,
        id: ConnectionId,
    ) -> Result<Response, ProxyError> {
        let start = Instant::now();
        let result = self.origin.fetch(request.host(), request.encode()).await;
        metrics::record_upstream(start, result.is_ok());

        let raw = result.inspect_err(|e| {
            tracing::error!(connection_id = %id, host = request.host(), error = %e, "Upstream error");
        })?;
        tracing::info!(
            connection_id = %id,
            host = request.host(),
            bytes = raw.len(),
            "Response received from the host"
        );

        let mut response = Response::parse(raw);
        if !response.is_valid() {
            tracing::warn!(
                connection_id = %id,
                host = request.host(),
                error = ?response.parse_error(),
                "Relaying unparseable response"
            );
            return Ok(response);
        }

        match self.prepare_response(&mut response) {
            Ok(true) => tracing::debug!(connection_id = %id, "The response was rewritten"),
            Ok(false) => {}
            Err(e) => tracing::warn!(connection_id = %id, error = %e, "Failed to rewrite the response"),
        }
        self.cache.store(resource_key, response.clone());
        Ok(response)
    }
}
