use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Technician,
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Technician => "technician",
            Self::User => "user",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "technician" => Some(Self::Technician),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// Delivery coordinates for one rule subscriber. Channel fan-out skips
/// addresses that are absent here, and directory lookups skip contacts
/// whose account has been deactivated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContact {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
}

impl UserContact {
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref().filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_addresses_are_absent() {
        let u = UserContact {
            id: 1,
            username: "tech".into(),
            role: Role::Technician,
            email: Some(String::new()),
            phone: None,
            is_active: true,
        };
        assert!(u.email().is_none());
        assert!(u.phone().is_none());
    }
}
