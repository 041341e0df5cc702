//! Saved shipping addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kirana_core::{AddressId, UserId};

use super::ShippingAddress;

/// A saved address.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Address {
    pub id: AddressId,
    #[serde(skip)]
    pub user_id: UserId,
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// Copy of the address stored on an order.
    #[must_use]
    pub fn snapshot(&self) -> ShippingAddress {
        ShippingAddress {
            full_name: self.full_name.clone(),
            phone: self.phone.clone(),
            line1: self.line1.clone(),
            line2: self.line2.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
        }
    }
}

/// Body for creating or replacing an address.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

fn default_country() -> String {
    "India".to_string()
}

impl AddressInput {
    /// Check required fields and formats.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("full_name", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(format!("{field} is required"));
            }
        }

        let digits = self.phone.chars().filter(char::is_ascii_digit).count();
        if !(10..=13).contains(&digits) {
            return Err("phone must have 10 to 13 digits".to_string());
        }
        if self.postal_code.len() != 6 || !self.postal_code.chars().all(|c| c.is_ascii_digit()) {
            return Err("postal_code must be a 6-digit PIN code".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            full_name: "Asha Kulkarni".to_string(),
            phone: "+91 98765 43210".to_string(),
            line1: "12 MG Road".to_string(),
            line2: None,
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            postal_code: "411001".to_string(),
            country: default_country(),
            is_default: false,
        }
    }

    #[test]
    fn test_valid_address() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn test_invalid_fields() {
        let mut a = input();
        a.city = "  ".to_string();
        assert_eq!(a.validate(), Err("city is required".to_string()));

        let mut a = input();
        a.phone = "12345".to_string();
        assert!(a.validate().is_err());

        let mut a = input();
        a.postal_code = "41100".to_string();
        assert!(a.validate().is_err());
    }
}
