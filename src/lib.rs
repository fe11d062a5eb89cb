//! authgate — policy-based authorization and audit for daemon API calls.
//!
//! Sits between a client and a privileged daemon. Every intercepted call
//! is classified into an action, decided against a flat user → allowed
//! actions policy set, and recorded in an append-only audit trail.
//!
//! See `DESIGN.md` for the architecture.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod authz;
pub mod config;
pub mod gatekeeper;
pub mod logging;
