use crate::error::{BookingError, BookingResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgeBand {
    Adult,
    Child,
    Infant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Traveler {
    pub full_name: String,
    pub age_band: AgeBand,
}

/// Who to reach about the booking; requires a name and at least one channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactDetails {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactDetails {
    pub fn validate(&self) -> BookingResult<()> {
        if self.full_name.trim().is_empty() {
            return Err(BookingError::InvalidCriteria(
                "contact name".to_string(),
            ));
        }
        let reachable = self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
            || self.phone.as_deref().is_some_and(|p| !p.trim().is_empty());
        if !reachable {
            return Err(BookingError::InvalidCriteria(
                "an email address or phone number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Every traveler needs a non-empty name for ticketing
pub fn validate_travelers(travelers: &[Traveler]) -> BookingResult<()> {
    if travelers.is_empty() {
        return Err(BookingError::InvalidCriteria(
            "at least one traveler".to_string(),
        ));
    }
    if travelers.iter().any(|t| t.full_name.trim().is_empty()) {
        return Err(BookingError::InvalidCriteria(
            "a name for every traveler".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_needs_reachable_channel() {
        let contact = ContactDetails {
            full_name: "Ada Boyle".to_string(),
            email: None,
            phone: None,
        };
        assert!(contact.validate().is_err());

        let contact = ContactDetails {
            email: Some("ada@example.com".to_string()),
            ..contact
        };
        assert!(contact.validate().is_ok());
    }

    #[test]
    fn test_travelers_need_names() {
        assert!(validate_travelers(&[]).is_err());
        let travelers = vec![
            Traveler {
                full_name: "Ada Boyle".to_string(),
                age_band: AgeBand::Adult,
            },
            Traveler {
                full_name: "  ".to_string(),
                age_band: AgeBand::Child,
            },
        ];
        assert!(validate_travelers(&travelers).is_err());
    }
}
