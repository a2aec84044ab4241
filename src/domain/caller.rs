use {
    super::id::UserId,
    super::order::Order,
    serde::{Deserialize, Serialize},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

/// Identity handed over by the upstream auth layer.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Caller {
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Customer,
            email: None,
            name: None,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            role: Role::Admin,
            ..Self::customer(user_id)
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can_access(&self, order: &Order) -> bool {
        self.is_admin() || order.is_owned_by(self.user_id)
    }

    /// Label written to the audit log.
    pub fn actor(&self) -> String {
        match self.role {
            Role::Customer => format!("user:{}", self.user_id),
            Role::Admin => format!("admin:{}", self.user_id),
        }
    }
}
