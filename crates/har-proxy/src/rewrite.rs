//! Outbound host redirection.
//!
//! Rules are kept in insertion order; the first rule whose `host` equals the
//! request authority (exact string comparison, port included when present)
//! replaces it with `new_host`. The `Host` header is left as the client sent
//! it, so a rule behaves like a hosts-file entry pointing a name elsewhere.

use hyper::http::uri::{Authority, Uri};
use hyper::Request;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A single host redirection rule, `{ "host": "a.test", "newHost": "b.test" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRule {
    pub host: String,
    #[serde(alias = "NewHost")]
    pub new_host: String,
}

impl HostRule {
    pub fn new(host: impl Into<String>, new_host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            new_host: new_host.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("invalid replacement host '{0}'")]
    InvalidHost(String),
    #[error("host rule with empty host")]
    EmptyHost,
}

struct CompiledRule {
    rule: HostRule,
    authority: Authority,
}

/// Ordered host rule table for one proxy instance.
#[derive(Default)]
pub struct HostRewriter {
    rules: RwLock<Vec<CompiledRule>>,
}

impl HostRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rules after the existing ones. Either every rule is added or none is.
    pub fn add(&self, rules: Vec<HostRule>) -> Result<usize, RewriteError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            if rule.host.is_empty() {
                return Err(RewriteError::EmptyHost);
            }
            let authority = rule
                .new_host
                .parse::<Authority>()
                .map_err(|_| RewriteError::InvalidHost(rule.new_host.clone()))?;
            compiled.push(CompiledRule { rule, authority });
        }

        let added = compiled.len();
        self.rules.write().extend(compiled);
        Ok(added)
    }

    /// Rewrite the request's destination on the first matching rule.
    /// Returns the replacement host when a rule matched.
    pub fn apply<B>(&self, req: &mut Request<B>) -> Option<String> {
        let current = req.uri().authority()?.as_str().to_string();
        let rules = self.rules.read();
        let matched = rules.iter().find(|c| c.rule.host == current)?;

        let mut parts = req.uri().clone().into_parts();
        parts.authority = Some(matched.authority.clone());
        match Uri::from_parts(parts) {
            Ok(uri) => {
                debug!("Replacing host {} with {}", current, matched.rule.new_host);
                *req.uri_mut() = uri;
                Some(matched.rule.new_host.clone())
            }
            Err(e) => {
                warn!("Failed to rewrite host {}: {}", current, e);
                None
            }
        }
    }

    pub fn rules(&self) -> Vec<HostRule> {
        self.rules.read().iter().map(|c| c.rule.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}
