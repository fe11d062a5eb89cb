//! Policy store: named user → allowed-action-pattern bindings.
//!
//! Policies are loaded once at startup and never mutated afterwards, so a
//! [`PolicyStore`] can be shared across request workers behind an `Arc`
//! without locking.
//!
//! Each user is expected to appear in exactly one policy. When a user is
//! listed by several, lookup returns the first one in load order and the
//! overlap is reported as a warning. Strict loading turns the overlap into
//! a [`ConfigError`] instead.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure to load a policy set. Fatal to startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The policy file could not be read.
    #[error("failed to read policy file {path}: {source}")]
    Io {
        /// File that failed to read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A policy definition is not valid JSON or has the wrong shape.
    #[error("malformed policy definition at line {line}: {source}")]
    Parse {
        /// 1-based line number (1 for array sources).
        line: usize,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// An `actions` entry is not a valid regular expression.
    #[error("policy '{policy}': action pattern #{index} is not a valid regular expression: {source}")]
    InvalidPattern {
        /// Policy that carries the bad pattern.
        policy: String,
        /// 0-based position within `actions`.
        index: usize,
        /// Regex compile error.
        source: regex::Error,
    },

    /// A policy has no name.
    #[error("policy at line {line} has an empty name")]
    EmptyName {
        /// 1-based line number.
        line: usize,
    },

    /// Strict mode: a user is bound by more than one policy.
    #[error("user '{user}' appears in both policy '{first}' and policy '{second}'")]
    DuplicateUser {
        /// The ambiguous user.
        user: String,
        /// Policy that wins under first-match lookup.
        first: String,
        /// Later policy that also lists the user.
        second: String,
    },

    /// Strict mode: two policies share a name.
    #[error("policy name '{0}' is defined more than once")]
    DuplicateName(String),
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Serialized policy shape.
#[derive(Debug, Deserialize)]
struct PolicyDef {
    name: String,
    #[serde(default)]
    users: Vec<String>,
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    readonly: bool,
}

/// A loaded policy with its action patterns compiled.
#[derive(Debug, Clone)]
pub struct Policy {
    name: String,
    users: Vec<String>,
    actions: Vec<Regex>,
    readonly: bool,
}

impl Policy {
    /// Build a policy from raw patterns. Each pattern must match the whole
    /// action id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] for the first pattern that
    /// fails to compile.
    pub fn new(
        name: impl Into<String>,
        users: Vec<String>,
        actions: &[String],
        readonly: bool,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let compiled = actions
            .iter()
            .enumerate()
            .map(|(index, pattern)| {
                let invalid = |source| ConfigError::InvalidPattern {
                    policy: name.clone(),
                    index,
                    source,
                };
                // The bare pattern must compile on its own; otherwise an
                // unbalanced `)` could close the anchoring group early.
                Regex::new(pattern).map_err(invalid)?;
                Regex::new(&format!("^(?:{pattern})$")).map_err(invalid)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            users,
            actions: compiled,
            readonly,
        })
    }

    /// Policy name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Users bound by this policy.
    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// Whether only read actions are permitted.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Returns `true` when `user` is bound by this policy. An empty user
    /// never matches.
    pub fn applies_to(&self, user: &str) -> bool {
        !user.is_empty() && self.users.iter().any(|u| u == user)
    }

    /// Returns `true` when any pattern fully matches `action_id`.
    pub fn permits(&self, action_id: &str) -> bool {
        self.actions.iter().any(|re| re.is_match(action_id))
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Immutable, ordered set of policies.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    policies: Vec<Policy>,
}

impl PolicyStore {
    /// Build a store from already-constructed policies, keeping their order.
    ///
    /// # Errors
    ///
    /// In strict mode, returns [`ConfigError::DuplicateUser`] or
    /// [`ConfigError::DuplicateName`] for overlapping definitions.
    pub fn from_policies(policies: Vec<Policy>, strict: bool) -> Result<Self, ConfigError> {
        check_overlaps(&policies, strict)?;
        Ok(Self { policies })
    }

    /// Parse a policy set.
    ///
    /// Accepts either a JSON array of policy objects or one JSON policy
    /// object per line (blank lines and `#` comments are skipped). Loading
    /// is all-or-nothing: the first bad definition fails the whole set.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first malformed definition.
    pub fn load(source: &str, strict: bool) -> Result<Self, ConfigError> {
        let defs = parse_definitions(source)?;
        let policies = defs
            .into_iter()
            .map(|(line, def)| {
                if def.name.trim().is_empty() {
                    return Err(ConfigError::EmptyName { line });
                }
                Policy::new(def.name, def.users, &def.actions, def.readonly)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let store = Self::from_policies(policies, strict)?;
        debug!(policies = store.len(), strict, "policy set loaded");
        Ok(store)
    }

    /// Read and parse a policy file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise any
    /// error from [`PolicyStore::load`].
    pub fn load_file(path: impl AsRef<Path>, strict: bool) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load(&contents, strict)
    }

    /// Find the policy governing `user`.
    ///
    /// Linear scan in load order; the first policy listing the user wins.
    /// Several policies listing the same user is a declared ambiguity, so
    /// later ones are simply never consulted for that user.
    pub fn find_policy(&self, user: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.applies_to(user))
    }

    /// All policies in load order.
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Number of loaded policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns `true` when no policies are loaded.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Split the source into `(line, definition)` pairs.
fn parse_definitions(source: &str) -> Result<Vec<(usize, PolicyDef)>, ConfigError> {
    if source.trim_start().starts_with('[') {
        let defs: Vec<PolicyDef> =
            serde_json::from_str(source).map_err(|source| ConfigError::Parse { line: 1, source })?;
        return Ok(defs.into_iter().map(|def| (1, def)).collect());
    }

    source
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            let line_no = idx.saturating_add(1);
            serde_json::from_str::<PolicyDef>(line)
                .map(|def| (line_no, def))
                .map_err(|source| ConfigError::Parse {
                    line: line_no,
                    source,
                })
        })
        .collect()
}

/// Report users or names claimed by more than one policy.
fn check_overlaps(policies: &[Policy], strict: bool) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for policy in policies {
        if !names.insert(policy.name()) {
            if strict {
                return Err(ConfigError::DuplicateName(policy.name().to_owned()));
            }
            warn!(policy = policy.name(), "policy name defined more than once");
        }
    }

    for (pos, policy) in policies.iter().enumerate() {
        for user in policy.users() {
            let Some(first) = policies[..pos].iter().find(|p| p.applies_to(user)) else {
                continue;
            };
            if strict {
                return Err(ConfigError::DuplicateUser {
                    user: user.clone(),
                    first: first.name().to_owned(),
                    second: policy.name().to_owned(),
                });
            }
            warn!(
                user = %user,
                effective = first.name(),
                ignored = policy.name(),
                "user appears in more than one policy; first policy wins"
            );
        }
    }
    Ok(())
}
