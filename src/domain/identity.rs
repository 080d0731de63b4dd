use serde::{Deserialize, Serialize};

label_id!(
    /// Verified customer identifier supplied by the identity provider.
    CustomerId
);
label_id!(
    /// Whoever caused a ledger event: a customer or a system process.
    ActorId
);

impl ActorId {
    pub const EXPIRY: &'static str = "system:expiry";
    pub const RECOVERY: &'static str = "system:recovery";

    pub fn expiry() -> Self {
        Self::from(Self::EXPIRY)
    }
}

impl From<&CustomerId> for ActorId {
    fn from(customer: &CustomerId) -> Self {
        Self::new(customer.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

/// A caller identity as verified by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub customer: CustomerId,
    pub role: Role,
}

impl Identity {
    pub fn customer(id: impl Into<String>) -> Self {
        Self {
            customer: CustomerId::new(id),
            role: Role::Customer,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            customer: CustomerId::new(id),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins may act on behalf of any customer.
    pub fn may_act_for(&self, owner: &CustomerId) -> bool {
        self.is_admin() || &self.customer == owner
    }

    pub fn actor(&self) -> ActorId {
        ActorId::from(&self.customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ownership_rules() {
        let owner = CustomerId::from("C1");
        assert!(Identity::customer("C1").may_act_for(&owner));
        assert!(!Identity::customer("C2").may_act_for(&owner));
        assert!(Identity::admin("ops").may_act_for(&owner));
    }
}
