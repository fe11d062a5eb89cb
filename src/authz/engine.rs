//! Decision engine: classify, look up the caller's policy, decide.
//!
//! Evaluation is fail-closed. Missing policies, readonly violations and
//! unmatched actions all resolve to an explicit deny with a reason; the
//! engine never returns an error for a well-formed request. Deny reasons
//! name the action and policy but never the configured patterns.

use std::sync::Arc;

use tracing::debug;

use super::action::classify;
use super::policy::PolicyStore;
use super::{Authorizer, Decision, Request};

/// Evaluates requests against a shared, immutable [`PolicyStore`].
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    store: Arc<PolicyStore>,
}

impl DecisionEngine {
    /// Create an engine over the given policy set.
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self { store }
    }

    /// Decide whether `request` may reach the daemon.
    pub fn evaluate(&self, request: &Request) -> Decision {
        let action = classify(&request.method, &request.uri);
        if action.is_generic() {
            debug!(method = %request.method, uri = %request.uri, "unrecognized route");
        }

        let Some(policy) = self.store.find_policy(&request.user) else {
            debug!(user = %request.user, action = %action.id, "no policy for user");
            return Decision::deny(format!(
                "no policy found for user '{}'",
                request.user
            ));
        };

        if policy.is_readonly() && !action.is_read() {
            debug!(
                user = %request.user,
                action = %action.id,
                policy = policy.name(),
                "readonly policy rejects write action"
            );
            return Decision::deny(format!(
                "action '{}' denied: policy '{}' is readonly",
                action.id,
                policy.name()
            ));
        }

        let allow = policy.permits(&action.id);
        debug!(
            user = %request.user,
            action = %action.id,
            policy = policy.name(),
            allow,
            "request evaluated"
        );
        if allow {
            Decision::allow(format!(
                "action '{}' allowed by policy '{}'",
                action.id,
                policy.name()
            ))
        } else {
            Decision::deny(format!(
                "action '{}' not allowed by policy '{}'",
                action.id,
                policy.name()
            ))
        }
    }

    /// Decide whether a daemon response may reach the client.
    ///
    /// Responses are never gated: outbound traffic has no policy applied.
    pub fn evaluate_response(&self, _request: &Request) -> Decision {
        Decision::allow("response allowed")
    }
}

impl Authorizer for DecisionEngine {
    fn authorize_request(&self, request: &Request) -> Decision {
        self.evaluate(request)
    }

    fn authorize_response(&self, request: &Request) -> Decision {
        self.evaluate_response(request)
    }
}
