use serde::{Deserialize, Serialize};

// ============================================================================
// User Profiles (read-only to this crate)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Wholesaler,
    Retailer,
    VehicleOwner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Wholesaler => "wholesaler",
            Role::Retailer => "retailer",
            Role::VehicleOwner => "vehicle_owner",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub shop_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            shop_name: None,
            address: None,
            phone: None,
        }
    }

    pub fn with_shop(mut self, shop_name: impl Into<String>, address: impl Into<String>) -> Self {
        self.shop_name = Some(shop_name.into());
        self.address = Some(address.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// The wholesaler on whose behalf packing runs, as supplied by the caller's
/// session. Never authenticated here.
#[derive(Debug, Clone)]
pub struct ActingWholesaler {
    pub id: String,
    pub name: String,
    pub shop_name: String,
    pub address: String,
    pub phone: String,
}

impl From<&UserProfile> for ActingWholesaler {
    fn from(profile: &UserProfile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            shop_name: profile.shop_name.clone().unwrap_or_default(),
            address: profile.address.clone().unwrap_or_default(),
            phone: profile.phone.clone().unwrap_or_default(),
        }
    }
}
