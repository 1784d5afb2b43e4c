//! Network eligibility for emergency overrides.
//!
//! Order of checks on a joined network:
//! 1. allowlist configured and network absent -> deny
//! 2. public-network heuristic (when enabled) -> deny
//! 3. blocklist hit -> deny
//!
//! A box serving its own access point cannot tell where it is, so it is
//! always eligible.

use serde::{Deserialize, Serialize};

/// Name fragments that mark a network as public.
const PUBLIC_MARKERS: [&str; 9] = [
    "free", "guest", "public", "hotel", "airport", "cafe", "coffee", "starbucks", "library",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicy {
    pub block_on_public: bool,
    pub allowed_networks: Vec<String>,
    pub blocked_networks: Vec<String>,
}

impl NetworkPolicy {
    /// Build from the JSON-encoded string arrays kept in the store.
    /// Unparseable lists are treated as empty.
    pub fn from_stored(block_on_public: bool, allowed_json: &str, blocked_json: &str) -> Self {
        Self {
            block_on_public,
            allowed_networks: parse_list("allowed_networks", allowed_json),
            blocked_networks: parse_list("blocked_networks", blocked_json),
        }
    }

    pub fn allowed_json(&self) -> String {
        serde_json::to_string(&self.allowed_networks).unwrap_or_else(|_| "[]".into())
    }

    pub fn blocked_json(&self) -> String {
        serde_json::to_string(&self.blocked_networks).unwrap_or_else(|_| "[]".into())
    }

    pub fn is_allowed_on_current_network(&self, network_id: &str, is_ap_mode: bool) -> bool {
        if is_ap_mode {
            return true;
        }
        if !self.allowed_networks.is_empty()
            && !self.allowed_networks.iter().any(|n| n == network_id)
        {
            return false;
        }
        if self.block_on_public && looks_public(network_id) {
            return false;
        }
        !self.blocked_networks.iter().any(|n| n == network_id)
    }
}

pub fn looks_public(network_id: &str) -> bool {
    let lower = network_id.to_lowercase();
    PUBLIC_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn parse_list(key: &str, raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(key, error = %e, "network list is not a JSON string array, ignoring");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(block_on_public: bool, allowed: &[&str], blocked: &[&str]) -> NetworkPolicy {
        NetworkPolicy {
            block_on_public,
            allowed_networks: allowed.iter().map(|s| s.to_string()).collect(),
            blocked_networks: blocked.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn ap_mode_is_always_allowed() {
        let p = policy(true, &["Home"], &["Cafe Free"]);
        assert!(p.is_allowed_on_current_network("Cafe Free", true));
    }

    #[test]
    fn public_heuristic_only_when_enabled() {
        assert!(!policy(true, &[], &[]).is_allowed_on_current_network("Airport_Guest", false));
        assert!(policy(false, &[], &[]).is_allowed_on_current_network("Airport_Guest", false));
    }

    #[test]
    fn blocklist_denies() {
        let p = policy(false, &[], &["Office"]);
        assert!(!p.is_allowed_on_current_network("Office", false));
        assert!(p.is_allowed_on_current_network("Home", false));
    }

    #[test]
    fn allowlist_absence_denies_first() {
        let p = policy(false, &["Home"], &[]);
        assert!(!p.is_allowed_on_current_network("Neighbour", false));
        assert!(p.is_allowed_on_current_network("Home", false));
    }

    #[test]
    fn blocklist_beats_allowlist_membership() {
        let p = policy(false, &["Home"], &["Home"]);
        assert!(!p.is_allowed_on_current_network("Home", false));
    }

    #[test]
    fn stored_lists_parse_and_tolerate_garbage() {
        let p = NetworkPolicy::from_stored(false, r#"["Home","Lab"]"#, "not json");
        assert_eq!(p.allowed_networks, vec!["Home", "Lab"]);
        assert!(p.blocked_networks.is_empty());
        assert_eq!(p.allowed_json(), r#"["Home","Lab"]"#);
    }
}
