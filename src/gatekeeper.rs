//! Gatekeeper façade: the single entry point for the transport.
//!
//! Each request is decided first and audited second. The audit outcome is
//! reported to the operator log only; it never changes the decision that
//! goes back to the transport.

use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, error};

use crate::audit::{AuditSink, Auditor};
use crate::authz::{Authorizer, Decision, DecisionEngine, PolicyStore, Request};
use crate::config::GatekeeperConfig;

/// Orchestrates authorization and auditing for each intercepted call.
#[derive(Clone)]
pub struct Gatekeeper {
    authorizer: Arc<dyn Authorizer>,
    auditor: Arc<dyn Auditor>,
}

impl Gatekeeper {
    /// Wire an authorizer and an auditor together.
    pub fn new(authorizer: Arc<dyn Authorizer>, auditor: Arc<dyn Auditor>) -> Self {
        Self {
            authorizer,
            auditor,
        }
    }

    /// Build the default stack from configuration: policies loaded from
    /// `policy.path`, a [`DecisionEngine`] over them, and an [`AuditSink`].
    ///
    /// # Errors
    ///
    /// Fails when the policy file is unreadable or malformed. No partial
    /// policy set is ever served.
    pub fn from_config(config: &GatekeeperConfig) -> anyhow::Result<Self> {
        let sink = AuditSink::new(config.audit.clone());
        Self::from_config_with_auditor(config, Arc::new(sink))
    }

    /// Like [`Gatekeeper::from_config`], but records through `auditor`
    /// instead of the configured destination.
    ///
    /// # Errors
    ///
    /// Fails when the policy file is unreadable or malformed.
    pub fn from_config_with_auditor(
        config: &GatekeeperConfig,
        auditor: Arc<dyn Auditor>,
    ) -> anyhow::Result<Self> {
        let store = PolicyStore::load_file(&config.policy.path, config.policy.strict)
            .with_context(|| {
                format!(
                    "failed to load policies from {}",
                    config.policy.path.display()
                )
            })?;
        let engine = DecisionEngine::new(Arc::new(store));
        Ok(Self::new(Arc::new(engine), auditor))
    }

    /// Decide a client → daemon request and audit the decision.
    pub fn handle_request(&self, request: &Request) -> Decision {
        let decision = self.authorizer.authorize_request(request);
        debug!(allow = decision.allow, msg = %decision.message, "request decided");

        if let Err(e) = self.auditor.audit_request(Some(request), Some(&decision)) {
            error!(
                error = %e,
                user = %request.user,
                uri = %request.uri,
                "failed to audit request"
            );
        }
        decision
    }

    /// Decide a daemon → client response. Responses are always allowed.
    pub fn handle_response(&self, request: &Request) -> Decision {
        let decision = self.authorizer.authorize_response(request);
        if let Err(e) = self.auditor.audit_response(Some(request), Some(&decision)) {
            error!(error = %e, uri = %request.uri, "failed to audit response");
        }
        decision
    }
}

impl std::fmt::Debug for Gatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gatekeeper").finish_non_exhaustive()
    }
}
