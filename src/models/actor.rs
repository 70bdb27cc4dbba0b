use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Vendor,
    Customer,
    Partner,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "vendor" => Ok(Role::Vendor),
            "customer" => Ok(Role::Customer),
            "partner" => Ok(Role::Partner),
            other => Err(format!(
                "unknown role: {other}, expected admin/vendor/customer/partner"
            )),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Vendor => "vendor",
            Role::Customer => "customer",
            Role::Partner => "partner",
        };
        f.write_str(name)
    }
}

/// Authenticated caller. Vendors act for the shop whose id equals their own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_vendor_of(&self, shop_id: Uuid) -> bool {
        self.role == Role::Vendor && self.id == shop_id
    }

    pub fn is_partner(&self, partner_id: Uuid) -> bool {
        self.role == Role::Partner && self.id == partner_id
    }

    pub fn is_customer(&self, customer_id: Uuid) -> bool {
        self.role == Role::Customer && self.id == customer_id
    }
}
