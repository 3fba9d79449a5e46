use enumset::EnumSetType;
use serde::{Deserialize, Serialize};

use crate::models::Session;

/// Capability tags granted to a session. A protected view names the one
/// capability it requires; the gate checks set membership rather than
/// comparing role strings.
#[derive(Debug, EnumSetType, Serialize, Deserialize)]
#[enumset(serialize_repr = "list")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Admin,
    ProFeatures,
    AiChat,
    Billing,
}

impl Capability {
    /// Default denial copy, selected per capability.
    pub fn denial_copy(&self) -> &'static str {
        match self {
            Capability::Admin => "This area is restricted to administrators.",
            Capability::ProFeatures => "Upgrade to a Pro plan to unlock this feature.",
            Capability::AiChat => "Your current plan does not include AI chat access.",
            Capability::Billing => "Billing management is limited to account owners.",
        }
    }
}

/// View-gating outcome. Pure state: denial is rendered, never raised, and
/// the gate performs no navigation itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum GateOutcome {
    /// Permission data has not resolved yet; render a neutral loading
    /// affordance.
    Checking,
    /// Render the protected content unchanged.
    Granted,
    /// Render the fallback, or the capability's default denial copy.
    Denied { copy: String },
}

/// Gate a protected view behind a required capability.
///
/// `session` is `None` while the permission data is still resolving.
/// `fallback` overrides the default denial copy when supplied.
pub fn evaluate(
    session: Option<&Session>,
    required: Capability,
    fallback: Option<&str>,
) -> GateOutcome {
    let Some(session) = session else {
        return GateOutcome::Checking;
    };
    if session.capabilities.contains(required) {
        GateOutcome::Granted
    } else {
        GateOutcome::Denied {
            copy: fallback.unwrap_or(required.denial_copy()).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enumset::EnumSet;

    fn session(capabilities: EnumSet<Capability>) -> Session {
        Session {
            user_id: "u1".to_string(),
            authenticated: true,
            is_admin: false,
            capabilities,
        }
    }

    #[test]
    fn test_unresolved_session_is_checking() {
        assert_eq!(
            evaluate(None, Capability::Admin, None),
            GateOutcome::Checking
        );
    }

    #[test]
    fn test_granted_when_capability_present() {
        let s = session(Capability::Admin | Capability::AiChat);
        assert_eq!(evaluate(Some(&s), Capability::Admin, None), GateOutcome::Granted);
    }

    #[test]
    fn test_denied_uses_default_admin_copy() {
        let s = session(EnumSet::only(Capability::AiChat));
        let outcome = evaluate(Some(&s), Capability::Admin, None);
        assert_eq!(
            outcome,
            GateOutcome::Denied {
                copy: "This area is restricted to administrators.".to_string()
            }
        );
    }

    #[test]
    fn test_denied_uses_supplied_fallback() {
        let s = session(EnumSet::empty());
        let outcome = evaluate(Some(&s), Capability::ProFeatures, Some("Members only."));
        assert_eq!(
            outcome,
            GateOutcome::Denied {
                copy: "Members only.".to_string()
            }
        );
    }

    #[test]
    fn test_denial_copy_differs_per_capability() {
        let s = session(EnumSet::empty());
        let admin = evaluate(Some(&s), Capability::Admin, None);
        let upsell = evaluate(Some(&s), Capability::ProFeatures, None);
        assert_ne!(admin, upsell);
    }
}
