// gov-broker/src/capability.rs
// ============================================================================
// Module: Capability Authorization
// Description: Pure authorization-order checks 1-4 (§4.3): capability
//              lookup, deny-wins, allowed-actions, access-level envelope.
// Purpose: Keep the authorization decision logic free of I/O so it can be
//          unit tested against hand-built capabilities, matching the
//          teacher's `decision-gate-mcp::capabilities` registry-error
//          taxonomy style.
// Dependencies: gov-core, crate::errors, time
// ============================================================================

//! ## Overview
//! Each function here implements exactly one numbered step of §4.3's
//! authorization order and returns a [`crate::errors::BrokerError`] variant
//! carrying that step's stable reason code. [`crate::broker::ExtBroker`]
//! runs them in order and stops at the first failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use gov_core::model::AccessLevel;
use gov_core::model::Capability;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::errors::BrokerError;

// ============================================================================
// SECTION: Provider Action Levels
// ============================================================================

/// Maps `(provider, action)` to the minimum [`AccessLevel`] required to
/// perform it (§4.3 step 4). Unregistered `(provider, action)` pairs
/// default to [`AccessLevel::L1`] (read-scoped), a conservative default
/// that requires at least a narrow grant rather than the public L0 floor.
#[derive(Debug, Clone, Default)]
pub struct ProviderActionLevels {
    levels: HashMap<(String, String), AccessLevel>,
}

impl ProviderActionLevels {
    /// Builds an empty registry; every action falls back to the default
    /// level until registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the minimum access level required for `(provider,
    /// action)`.
    pub fn register(&mut self, provider: impl Into<String>, action: impl Into<String>, level: AccessLevel) {
        self.levels.insert((provider.into(), action.into()), level);
    }

    /// Returns the required level for `(provider, action)`, falling back to
    /// [`AccessLevel::L1`] when unregistered.
    #[must_use]
    pub fn required_level(&self, provider: &str, action: &str) -> AccessLevel {
        self.levels
            .get(&(provider.to_string(), action.to_string()))
            .copied()
            .unwrap_or(AccessLevel::L1)
    }
}

// ============================================================================
// SECTION: Authorization Steps
// ============================================================================

/// Step 1: capability must exist, be active, and not be expired as of
/// `now`.
///
/// # Errors
///
/// Returns [`BrokerError::NoCapability`] when no capability exists, it is
/// inactive, or its `expires_at` is in the past.
pub fn check_capability_active<'a>(
    capability: Option<&'a Capability>,
    group: &str,
    provider: &str,
    now: OffsetDateTime,
) -> Result<&'a Capability, BrokerError> {
    let not_found = || BrokerError::NoCapability { group: group.to_string(), provider: provider.to_string() };
    let capability = capability.ok_or_else(not_found)?;
    if !capability.active {
        return Err(not_found());
    }
    if let Some(expires_at) = &capability.expires_at {
        let expiry = OffsetDateTime::parse(expires_at, &Rfc3339).map_err(|_| not_found())?;
        if now >= expiry {
            return Err(not_found());
        }
    }
    Ok(capability)
}

/// Step 2: deny-wins. `action` must not appear in `denied_actions`,
/// regardless of `allowed_actions`.
///
/// # Errors
///
/// Returns [`BrokerError::DeniedByPolicy`] when `action` is denied.
pub fn check_deny_wins(capability: &Capability, action: &str) -> Result<(), BrokerError> {
    if capability.denied_actions.iter().any(|denied| denied == action) {
        return Err(BrokerError::DeniedByPolicy {
            provider: capability.provider.clone(),
            action: action.to_string(),
        });
    }
    Ok(())
}

/// Step 3: when `allowed_actions` is non-empty, `action` must be a member.
///
/// # Errors
///
/// Returns [`BrokerError::NotAllowed`] when the allow-list is non-empty and
/// does not contain `action`.
pub fn check_allowed_actions(capability: &Capability, action: &str) -> Result<(), BrokerError> {
    if capability.allowed_actions.is_empty() {
        return Ok(());
    }
    if capability.allowed_actions.iter().any(|allowed| allowed == action) {
        Ok(())
    } else {
        Err(BrokerError::NotAllowed { provider: capability.provider.clone(), action: action.to_string() })
    }
}

/// Step 4: the capability's access level must meet or exceed the action's
/// required level.
///
/// # Errors
///
/// Returns [`BrokerError::AccessLevelInsufficient`] when the capability's
/// level is below the required level.
pub fn check_access_level(
    capability: &Capability,
    action: &str,
    required: AccessLevel,
) -> Result<(), BrokerError> {
    if capability.access_level >= required {
        Ok(())
    } else {
        Err(BrokerError::AccessLevelInsufficient {
            provider: capability.provider.clone(),
            action: action.to_string(),
        })
    }
}

/// Validates the L2/L3 expiry invariant (§3 "L2/L3 must set `expires_at` ≤
/// granted_at + 7 days"). Returns `true` when the capability satisfies it;
/// `L0`/`L1` grants are unconstrained.
#[must_use]
pub fn expiry_within_seven_days(capability: &Capability) -> bool {
    if capability.access_level < AccessLevel::L2 {
        return true;
    }
    let Some(expires_at) = &capability.expires_at else { return false };
    let (Ok(granted), Ok(expiry)) =
        (OffsetDateTime::parse(&capability.granted_at, &Rfc3339), OffsetDateTime::parse(expires_at, &Rfc3339))
    else {
        return false;
    };
    expiry <= granted + time::Duration::days(7)
}

/// Validates the L3 "two prior approvals from distinct groups" invariant
/// given the count of recorded capability approvals.
#[must_use]
pub const fn l3_has_enough_approvals(access_level: AccessLevel, approval_count: usize) -> bool {
    if matches!(access_level, AccessLevel::L3) { approval_count >= 2 } else { true }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn capability(access_level: AccessLevel) -> Capability {
        Capability {
            group_folder: "developer".to_string(),
            provider: "github".to_string(),
            access_level,
            allowed_actions: Vec::new(),
            denied_actions: Vec::new(),
            granted_by: "main".to_string(),
            granted_at: "2026-01-01T00:00:00.000Z".to_string(),
            expires_at: None,
            active: true,
        }
    }

    #[test]
    fn missing_capability_is_no_capability() {
        let now = OffsetDateTime::parse("2026-01-01T00:00:00.000Z", &Rfc3339).expect("parse");
        let err = check_capability_active(None, "developer", "github", now).expect_err("denied");
        assert_eq!(err.code(), "NO_CAPABILITY");
    }

    #[test]
    fn expired_capability_is_no_capability() {
        let mut cap = capability(AccessLevel::L1);
        cap.expires_at = Some("2026-01-01T00:00:00.000Z".to_string());
        let now = OffsetDateTime::parse("2026-06-01T00:00:00.000Z", &Rfc3339).expect("parse");
        let err = check_capability_active(Some(&cap), "developer", "github", now).expect_err("denied");
        assert_eq!(err.code(), "NO_CAPABILITY");
    }

    #[test]
    fn inactive_capability_is_no_capability() {
        let mut cap = capability(AccessLevel::L1);
        cap.active = false;
        let now = OffsetDateTime::parse("2026-01-01T00:00:00.000Z", &Rfc3339).expect("parse");
        assert!(check_capability_active(Some(&cap), "developer", "github", now).is_err());
    }

    #[test]
    fn deny_wins_over_allowed() {
        let mut cap = capability(AccessLevel::L2);
        cap.allowed_actions = vec!["read".to_string()];
        cap.denied_actions = vec!["read".to_string()];
        let err = check_deny_wins(&cap, "read").expect_err("denied");
        assert_eq!(err.code(), "DENIED_BY_POLICY");
    }

    #[test]
    fn allowed_actions_empty_means_anything_allowed() {
        let cap = capability(AccessLevel::L1);
        assert!(check_allowed_actions(&cap, "whatever").is_ok());
    }

    #[test]
    fn access_level_must_meet_or_exceed_required() {
        let cap = capability(AccessLevel::L1);
        assert!(check_access_level(&cap, "read", AccessLevel::L0).is_ok());
        assert!(check_access_level(&cap, "read", AccessLevel::L1).is_ok());
        assert!(check_access_level(&cap, "write", AccessLevel::L2).is_err());
    }

    #[test]
    fn l2_expiry_must_be_within_seven_days() {
        let mut cap = capability(AccessLevel::L2);
        cap.granted_at = "2026-01-01T00:00:00.000Z".to_string();
        cap.expires_at = Some("2026-01-05T00:00:00.000Z".to_string());
        assert!(expiry_within_seven_days(&cap));
        cap.expires_at = Some("2026-02-01T00:00:00.000Z".to_string());
        assert!(!expiry_within_seven_days(&cap));
    }

    #[test]
    fn l3_requires_two_distinct_approvals() {
        assert!(!l3_has_enough_approvals(AccessLevel::L3, 1));
        assert!(l3_has_enough_approvals(AccessLevel::L3, 2));
        assert!(l3_has_enough_approvals(AccessLevel::L1, 0));
    }
}
