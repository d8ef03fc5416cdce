use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub professional_id: Option<String>,
    #[serde(default)]
    pub pets: Vec<Pet>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub breed: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub professional_id: String,
}

impl NewCustomer {
    /// First token is the first name, the rest is the last name.
    pub fn from_parts(
        name: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
        professional_id: &str,
    ) -> Self {
        let mut parts = name.unwrap_or_default().split_whitespace();
        let first_name = parts.next().unwrap_or_default().to_string();
        let last_name = parts.collect::<Vec<_>>().join(" ");
        Self {
            first_name,
            last_name,
            email: email.unwrap_or_default().to_string(),
            phone: phone.unwrap_or_default().to_string(),
            professional_id: professional_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewPet {
    pub owner_id: String,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub gender: String,
}

/// Body of the customer update call that attaches new pets.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PetsUpdate {
    pub id: String,
    pub professional_id: String,
    pub pets: Vec<NewPet>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_customer_splits_name() {
        let c = NewCustomer::from_parts(Some("Jane van Dyke"), None, Some("+1555"), "pro-1");
        assert_eq!(c.first_name, "Jane");
        assert_eq!(c.last_name, "van Dyke");
        assert_eq!(c.email, "");
        assert_eq!(c.phone, "+1555");
    }

    #[test]
    fn test_customer_deserializes_with_missing_fields() {
        let c: Customer = serde_json::from_value(serde_json::json!({
            "id": "c-1",
            "firstName": "Jane",
            "pets": [{"id": "p-1", "name": "Max", "species": "Dog"}]
        }))
        .unwrap();
        assert_eq!(c.full_name(), "Jane");
        assert_eq!(c.pets[0].species.as_deref(), Some("Dog"));
    }
}
