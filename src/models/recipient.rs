use crate::errors::ServiceError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Recipient payload accepted by checkout and fulfillment. Two shapes are
/// accepted transparently: an already-structured recipient (discriminated by
/// the presence of `address`) and a flat shape. Both normalize into
/// [`NormalizedRecipient`] at the boundary before any core logic runs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum RecipientInput {
    Structured(StructuredRecipient),
    Flat(FlatRecipient),
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StructuredRecipient {
    pub address: StructuredAddress,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StructuredAddress {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub town_or_city: Option<String>,
    #[serde(default)]
    pub state_or_county: Option<String>,
    #[serde(default)]
    pub postal_or_zip_code: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlatRecipient {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address_line1: Option<String>,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, alias = "stateOrCounty")]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Canonical recipient shape sent to the provider and persisted on the
/// order record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecipient {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub address: NormalizedAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAddress {
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub town_or_city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_or_county: Option<String>,
    pub postal_or_zip_code: String,
    pub country_code: String,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn require(
    value: &Option<String>,
    field: &'static str,
    missing: &mut Vec<&'static str>,
) -> String {
    match trimmed(value) {
        Some(v) => v,
        None => {
            missing.push(field);
            String::new()
        }
    }
}

impl RecipientInput {
    /// Validates required fields and produces the canonical shape, naming
    /// every missing field in a single error.
    pub fn normalize(&self) -> Result<NormalizedRecipient, ServiceError> {
        let mut missing = Vec::new();

        let normalized = match self {
            RecipientInput::Structured(r) => NormalizedRecipient {
                name: require(&r.name, "name", &mut missing),
                email: require(&r.email, "email", &mut missing),
                phone_number: trimmed(&r.phone_number),
                address: NormalizedAddress {
                    line1: require(&r.address.line1, "address.line1", &mut missing),
                    line2: trimmed(&r.address.line2),
                    town_or_city: require(
                        &r.address.town_or_city,
                        "address.townOrCity",
                        &mut missing,
                    ),
                    state_or_county: trimmed(&r.address.state_or_county),
                    postal_or_zip_code: require(
                        &r.address.postal_or_zip_code,
                        "address.postalOrZipCode",
                        &mut missing,
                    ),
                    country_code: require(
                        &r.address.country_code,
                        "address.countryCode",
                        &mut missing,
                    )
                    .to_uppercase(),
                },
            },
            RecipientInput::Flat(r) => NormalizedRecipient {
                name: require(&r.name, "name", &mut missing),
                email: require(&r.email, "email", &mut missing),
                phone_number: trimmed(&r.phone_number),
                address: NormalizedAddress {
                    line1: require(&r.address_line1, "addressLine1", &mut missing),
                    line2: trimmed(&r.address_line2),
                    town_or_city: require(&r.city, "city", &mut missing),
                    state_or_county: trimmed(&r.state),
                    postal_or_zip_code: require(&r.postal_code, "postalCode", &mut missing),
                    country_code: require(&r.country_code, "countryCode", &mut missing)
                        .to_uppercase(),
                },
            },
        };

        if missing.is_empty() {
            Ok(normalized)
        } else {
            Err(ServiceError::InvalidInput(format!(
                "recipient missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> RecipientInput {
        serde_json::from_value(value).expect("recipient input")
    }

    #[test]
    fn flat_shape_normalizes_into_structured_form() {
        let input = parse(json!({
            "name": "  Ana García ",
            "email": "ana@example.com",
            "addressLine1": "Calle Mayor 1",
            "city": "Madrid",
            "postalCode": "28001",
            "countryCode": "es"
        }));

        let normalized = input.normalize().unwrap();
        assert_eq!(normalized.name, "Ana García");
        assert_eq!(normalized.address.country_code, "ES");
        assert_eq!(normalized.address.town_or_city, "Madrid");
        // Optionals absent, not empty strings
        assert!(normalized.address.line2.is_none());
        assert!(normalized.address.state_or_county.is_none());
        assert!(normalized.phone_number.is_none());

        let serialized = serde_json::to_value(&normalized).unwrap();
        assert!(serialized.get("phoneNumber").is_none());
        assert!(serialized["address"].get("line2").is_none());
    }

    #[test]
    fn structured_shape_passes_through() {
        let input = parse(json!({
            "name": "Bob",
            "email": "bob@example.com",
            "address": {
                "line1": "1 Main St",
                "line2": "Apt 4",
                "townOrCity": "Lisbon",
                "postalOrZipCode": "1000-001",
                "countryCode": "pt"
            }
        }));

        let normalized = input.normalize().unwrap();
        assert_eq!(normalized.address.line2.as_deref(), Some("Apt 4"));
        assert_eq!(normalized.address.country_code, "PT");
    }

    #[test]
    fn missing_fields_are_all_named() {
        let input = parse(json!({ "name": "Carol" }));
        let err = input.normalize().unwrap_err();
        assert_matches!(err, ServiceError::InvalidInput(msg) => {
            assert!(msg.contains("email"));
            assert!(msg.contains("addressLine1"));
            assert!(msg.contains("city"));
            assert!(msg.contains("postalCode"));
            assert!(msg.contains("countryCode"));
            assert!(!msg.contains("name,"));
        });
    }

    #[test]
    fn structured_missing_address_fields_are_named() {
        let input = parse(json!({
            "email": "d@example.com",
            "address": { "line1": "x" }
        }));
        let err = input.normalize().unwrap_err();
        assert_matches!(err, ServiceError::InvalidInput(msg) => {
            assert!(msg.contains("name"));
            assert!(msg.contains("address.townOrCity"));
            assert!(msg.contains("address.postalOrZipCode"));
            assert!(msg.contains("address.countryCode"));
        });
    }

    #[test]
    fn empty_strings_count_as_missing() {
        let input = parse(json!({
            "name": "  ",
            "email": "e@example.com",
            "addressLine1": "Calle Sol 2",
            "city": "Sevilla",
            "postalCode": "41001",
            "countryCode": "ES"
        }));
        let err = input.normalize().unwrap_err();
        assert_matches!(err, ServiceError::InvalidInput(msg) => {
            assert!(msg.contains("name"));
        });
    }
}
