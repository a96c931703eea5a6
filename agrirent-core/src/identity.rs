use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform role of an authenticated user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Member,
    Admin,
}

/// Identity-verification state supplied by the KYC collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    Pending,
    Verified,
    Rejected,
}

/// An authenticated caller, resolved per request by the identity provider.
///
/// The booking core never authenticates anyone itself; it only evaluates
/// the principal it is handed against the role/ownership preconditions of
/// each transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub kyc_status: KycStatus,
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role, kyc_status: KycStatus) -> Self {
        Self {
            user_id,
            role,
            kyc_status,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.kyc_status == KycStatus::Verified
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verified_check() {
        let p = Principal::new(Uuid::new_v4(), Role::Member, KycStatus::Pending);
        assert!(!p.is_verified());

        let p = Principal::new(Uuid::new_v4(), Role::Member, KycStatus::Verified);
        assert!(p.is_verified());
        assert!(!p.is_admin());
    }
}
