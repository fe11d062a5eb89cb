//! Action classification: raw `(method, uri)` → normalized action id.
//!
//! The route table mirrors the Docker Engine API. Classification never
//! fails; calls that match no route degrade to [`Action::generic`],
//! which is a write-kind action so that it falls on the deny side of
//! readonly policies.

use std::sync::LazyLock;

use regex::Regex;

/// Action id produced for calls that match no known route.
pub const GENERIC_ACTION: &str = "unknown";

/// Whether an action only observes daemon state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Inspects state without changing it.
    Read,
    /// Changes state, streams into a container, or is unrecognized.
    Write,
}

/// A classified request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Normalized identifier, e.g. `container_create`.
    pub id: String,
    /// Read or write.
    pub kind: ActionKind,
}

impl Action {
    /// The fallback action for unrecognized calls.
    pub fn generic() -> Self {
        Self {
            id: GENERIC_ACTION.to_owned(),
            kind: ActionKind::Write,
        }
    }

    /// Returns `true` for read-only actions.
    pub fn is_read(&self) -> bool {
        self.kind == ActionKind::Read
    }

    /// Returns `true` when the call matched no known route.
    pub fn is_generic(&self) -> bool {
        self.id == GENERIC_ACTION
    }
}

// ---------------------------------------------------------------------------
// Route table
// ---------------------------------------------------------------------------

use ActionKind::{Read, Write};

/// `(method, path pattern, action id, kind)`.
///
/// `{id}` segments are `[^/]+`; image names may contain slashes and use
/// `.+`. Order matters: literal segments come before parameter segments
/// under the same prefix.
const ROUTES: &[(&str, &str, &str, ActionKind)] = &[
    // Containers
    ("GET", "/containers/json", "container_list", Read),
    ("POST", "/containers/create", "container_create", Write),
    ("POST", "/containers/prune", "container_prune", Write),
    ("GET", "/containers/[^/]+/json", "container_inspect", Read),
    ("GET", "/containers/[^/]+/top", "container_top", Read),
    ("GET", "/containers/[^/]+/logs", "container_logs", Read),
    ("GET", "/containers/[^/]+/changes", "container_changes", Read),
    ("GET", "/containers/[^/]+/export", "container_export", Read),
    ("GET", "/containers/[^/]+/stats", "container_stats", Read),
    ("POST", "/containers/[^/]+/resize", "container_resize", Write),
    ("POST", "/containers/[^/]+/start", "container_start", Write),
    ("POST", "/containers/[^/]+/stop", "container_stop", Write),
    ("POST", "/containers/[^/]+/restart", "container_restart", Write),
    ("POST", "/containers/[^/]+/kill", "container_kill", Write),
    ("POST", "/containers/[^/]+/update", "container_update", Write),
    ("POST", "/containers/[^/]+/rename", "container_rename", Write),
    ("POST", "/containers/[^/]+/pause", "container_pause", Write),
    ("POST", "/containers/[^/]+/unpause", "container_unpause", Write),
    ("POST", "/containers/[^/]+/attach", "container_attach", Write),
    ("GET", "/containers/[^/]+/attach/ws", "container_attach_ws", Write),
    ("POST", "/containers/[^/]+/wait", "container_wait", Write),
    ("POST", "/containers/[^/]+/copy", "container_copyfiles", Write),
    ("POST", "/containers/[^/]+/exec", "container_exec_create", Write),
    ("HEAD", "/containers/[^/]+/archive", "container_archive_info", Read),
    ("GET", "/containers/[^/]+/archive", "container_archive", Read),
    ("PUT", "/containers/[^/]+/archive", "container_archive_extract", Write),
    ("DELETE", "/containers/[^/]+", "container_delete", Write),
    ("POST", "/commit", "container_commit", Write),
    // Exec
    ("POST", "/exec/[^/]+/start", "exec_start", Write),
    ("POST", "/exec/[^/]+/resize", "exec_resize", Write),
    ("GET", "/exec/[^/]+/json", "exec_inspect", Read),
    // Images
    ("GET", "/images/json", "image_list", Read),
    ("POST", "/build", "image_build", Write),
    ("POST", "/build/prune", "build_prune", Write),
    ("POST", "/images/create", "image_create", Write),
    ("POST", "/images/load", "image_load", Write),
    ("POST", "/images/prune", "image_prune", Write),
    ("GET", "/images/search", "image_search", Read),
    ("GET", "/images/get", "image_archive_multiple", Read),
    ("GET", "/images/.+/json", "image_inspect", Read),
    ("GET", "/images/.+/history", "image_history", Read),
    ("GET", "/images/.+/get", "image_archive", Read),
    ("POST", "/images/.+/push", "image_push", Write),
    ("POST", "/images/.+/tag", "image_tag", Write),
    ("DELETE", "/images/.+", "image_delete", Write),
    ("GET", "/distribution/.+/json", "image_distribution_inspect", Read),
    // Networks
    ("GET", "/networks", "network_list", Read),
    ("POST", "/networks/create", "network_create", Write),
    ("POST", "/networks/prune", "network_prune", Write),
    ("POST", "/networks/[^/]+/connect", "network_connect", Write),
    ("POST", "/networks/[^/]+/disconnect", "network_disconnect", Write),
    ("GET", "/networks/[^/]+", "network_inspect", Read),
    ("DELETE", "/networks/[^/]+", "network_remove", Write),
    // Volumes
    ("GET", "/volumes", "volume_list", Read),
    ("POST", "/volumes/create", "volume_create", Write),
    ("POST", "/volumes/prune", "volume_prune", Write),
    ("GET", "/volumes/[^/]+", "volume_inspect", Read),
    ("PUT", "/volumes/[^/]+", "volume_update", Write),
    ("DELETE", "/volumes/[^/]+", "volume_remove", Write),
    // Swarm
    ("GET", "/swarm", "swarm_inspect", Read),
    ("POST", "/swarm/init", "swarm_init", Write),
    ("POST", "/swarm/join", "swarm_join", Write),
    ("POST", "/swarm/leave", "swarm_leave", Write),
    ("POST", "/swarm/update", "swarm_update", Write),
    ("GET", "/swarm/unlockkey", "swarm_unlock_key", Read),
    ("POST", "/swarm/unlock", "swarm_unlock", Write),
    ("GET", "/nodes", "node_list", Read),
    ("GET", "/nodes/[^/]+", "node_inspect", Read),
    ("POST", "/nodes/[^/]+/update", "node_update", Write),
    ("DELETE", "/nodes/[^/]+", "node_remove", Write),
    ("GET", "/services", "service_list", Read),
    ("POST", "/services/create", "service_create", Write),
    ("GET", "/services/[^/]+/logs", "service_logs", Read),
    ("POST", "/services/[^/]+/update", "service_update", Write),
    ("GET", "/services/[^/]+", "service_inspect", Read),
    ("DELETE", "/services/[^/]+", "service_remove", Write),
    ("GET", "/tasks", "task_list", Read),
    ("GET", "/tasks/[^/]+/logs", "task_logs", Read),
    ("GET", "/tasks/[^/]+", "task_inspect", Read),
    ("GET", "/secrets", "secret_list", Read),
    ("POST", "/secrets/create", "secret_create", Write),
    ("POST", "/secrets/[^/]+/update", "secret_update", Write),
    ("GET", "/secrets/[^/]+", "secret_inspect", Read),
    ("DELETE", "/secrets/[^/]+", "secret_remove", Write),
    ("GET", "/configs", "config_list", Read),
    ("POST", "/configs/create", "config_create", Write),
    ("POST", "/configs/[^/]+/update", "config_update", Write),
    ("GET", "/configs/[^/]+", "config_inspect", Read),
    ("DELETE", "/configs/[^/]+", "config_remove", Write),
    // Plugins
    ("GET", "/plugins", "plugin_list", Read),
    ("GET", "/plugins/privileges", "plugin_privileges", Read),
    ("POST", "/plugins/pull", "plugin_install", Write),
    ("POST", "/plugins/create", "plugin_create", Write),
    ("GET", "/plugins/.+/json", "plugin_inspect", Read),
    ("POST", "/plugins/.+/enable", "plugin_enable", Write),
    ("POST", "/plugins/.+/disable", "plugin_disable", Write),
    ("POST", "/plugins/.+/upgrade", "plugin_upgrade", Write),
    ("POST", "/plugins/.+/push", "plugin_push", Write),
    ("POST", "/plugins/.+/set", "plugin_set", Write),
    ("DELETE", "/plugins/.+", "plugin_remove", Write),
    // System
    ("POST", "/auth", "docker_check_auth", Write),
    ("GET", "/info", "docker_info", Read),
    ("GET", "/version", "docker_version", Read),
    ("GET", "/_ping", "docker_ping", Read),
    ("HEAD", "/_ping", "docker_ping", Read),
    ("GET", "/events", "docker_events", Read),
    ("GET", "/system/df", "docker_disk_usage", Read),
    ("POST", "/session", "docker_session", Write),
];

/// A compiled route.
struct Route {
    method: &'static str,
    path: Regex,
    id: &'static str,
    kind: ActionKind,
}

static ROUTE_TABLE: LazyLock<Vec<Route>> = LazyLock::new(|| {
    ROUTES
        .iter()
        .filter_map(|&(method, pattern, id, kind)| {
            Regex::new(&format!("^{pattern}$"))
                .ok()
                .map(|path| Route {
                    method,
                    path,
                    id,
                    kind,
                })
        })
        .collect()
});

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify a raw request into an [`Action`].
///
/// Deterministic and side-effect free. Unknown `(method, uri)` pairs
/// yield [`Action::generic`].
pub fn classify(method: &str, uri: &str) -> Action {
    let path = normalize_path(uri);
    ROUTE_TABLE
        .iter()
        .find(|route| route.method.eq_ignore_ascii_case(method) && route.path.is_match(path))
        .map(|route| Action {
            id: route.id.to_owned(),
            kind: route.kind,
        })
        .unwrap_or_else(Action::generic)
}

/// Returns `true` when `action_id` names a recognized read action.
pub fn is_read_action(action_id: &str) -> bool {
    ROUTES
        .iter()
        .any(|&(_, _, id, kind)| id == action_id && kind == ActionKind::Read)
}

/// Strip the query string, an optional `/vX.Y` API version prefix and
/// trailing slashes.
fn normalize_path(uri: &str) -> &str {
    let path = uri.split(['?', '#']).next().unwrap_or("");
    let path = strip_version_prefix(path);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

fn strip_version_prefix(path: &str) -> &str {
    let Some(rest) = path.strip_prefix("/v") else {
        return path;
    };
    let end = rest.find('/').unwrap_or(rest.len());
    let version = &rest[..end];
    let is_version = version.starts_with(|c: char| c.is_ascii_digit())
        && version.chars().all(|c| c.is_ascii_digit() || c == '.');
    if is_version {
        &rest[end..]
    } else {
        path
    }
}
