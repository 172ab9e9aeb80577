//! Shipping address entity.
//!
//! Address CRUD lives outside this core; the entity exists so checkout
//! can validate ownership before creating orders.

use common::{AddressId, UserId};
use serde::{Deserialize, Serialize};

/// A shipping address owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Unique address identifier.
    pub id: AddressId,

    /// Owning user.
    pub user_id: UserId,

    /// Recipient name.
    pub recipient: String,

    /// Street line.
    pub line1: String,

    /// City.
    pub city: String,

    /// Postal code.
    pub postal_code: String,
}

impl Address {
    /// Creates a new address for a user.
    pub fn new(
        user_id: UserId,
        recipient: impl Into<String>,
        line1: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        Self {
            id: AddressId::new(),
            user_id,
            recipient: recipient.into(),
            line1: line1.into(),
            city: city.into(),
            postal_code: postal_code.into(),
        }
    }

    /// Returns true if `user_id` owns this address.
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ownership() {
        let owner = UserId::new();
        let address = Address::new(owner, "A. Person", "1 Main St", "Springfield", "12345");
        assert!(address.is_owned_by(owner));
        assert!(!address.is_owned_by(UserId::new()));
    }
}
