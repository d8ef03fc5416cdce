use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    BookingRequest,
    BookingDetails,
    PetSitterConfirmation,
    ServiceConfirmation,
    FinalConfirmation,
    CasualConversation,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::BookingRequest => "booking_request",
            Intent::BookingDetails => "booking_details",
            Intent::PetSitterConfirmation => "pet_sitter_confirmation",
            Intent::ServiceConfirmation => "service_confirmation",
            Intent::FinalConfirmation => "final_confirmation",
            Intent::CasualConversation => "casual_conversation",
        }
    }

    /// Accepts both `snake_case` and the upper-case labels models tend to echo back.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "booking_request" => Some(Intent::BookingRequest),
            "booking_details" => Some(Intent::BookingDetails),
            "pet_sitter_confirmation" => Some(Intent::PetSitterConfirmation),
            "service_confirmation" => Some(Intent::ServiceConfirmation),
            "final_confirmation" => Some(Intent::FinalConfirmation),
            "casual_conversation" => Some(Intent::CasualConversation),
            _ => None,
        }
    }

    /// The only intent that may open the write path.
    pub fn is_execute_signal(&self) -> bool {
        matches!(self, Intent::PetSitterConfirmation)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PetMention {
    pub name: String,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub breed: Option<String>,
}

impl PetMention {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedEntities {
    pub intent: Intent,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub pets: Vec<PetMention>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub start_date_phrase: Option<String>,
    #[serde(default)]
    pub end_date_phrase: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub confirmed: Option<bool>,
    #[serde(default)]
    pub reply: Option<String>,
}

impl ExtractedEntities {
    pub fn casual() -> Self {
        Self::with_intent(Intent::CasualConversation)
    }

    pub fn with_intent(intent: Intent) -> Self {
        Self {
            intent,
            customer_name: None,
            customer_email: None,
            customer_phone: None,
            pets: Vec::new(),
            service_name: None,
            start_date_phrase: None,
            end_date_phrase: None,
            notes: None,
            confirmed: None,
            reply: None,
        }
    }

    /// Blank strings from the model are treated as "not mentioned".
    pub fn normalized(mut self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        }
        self.customer_name = clean(self.customer_name);
        self.customer_email = clean(self.customer_email);
        self.customer_phone = clean(self.customer_phone);
        self.service_name = clean(self.service_name);
        self.start_date_phrase = clean(self.start_date_phrase);
        self.end_date_phrase = clean(self.end_date_phrase);
        self.notes = clean(self.notes);
        self.reply = clean(self.reply);
        // A sitter turning the job down is not an acceptance.
        if self.intent.is_execute_signal() && self.confirmed == Some(false) {
            self.intent = Intent::CasualConversation;
        }
        self.pets = self
            .pets
            .into_iter()
            .filter_map(|p| {
                let name = p.name.trim().to_string();
                if name.is_empty() {
                    return None;
                }
                Some(PetMention {
                    name,
                    species: clean(p.species),
                    breed: clean(p.breed),
                })
            })
            .collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_upper_case_labels() {
        assert_eq!(Intent::parse("BOOKING_DETAILS"), Some(Intent::BookingDetails));
        assert_eq!(
            Intent::parse("pet sitter confirmation"),
            Some(Intent::PetSitterConfirmation)
        );
        assert_eq!(Intent::parse("smalltalk"), None);
    }

    #[test]
    fn test_only_pet_sitter_confirmation_executes() {
        assert!(Intent::PetSitterConfirmation.is_execute_signal());
        assert!(!Intent::FinalConfirmation.is_execute_signal());
        assert!(!Intent::ServiceConfirmation.is_execute_signal());
        assert!(!Intent::CasualConversation.is_execute_signal());
    }

    #[test]
    fn test_normalized_drops_blank_fields() {
        let mut e = ExtractedEntities::with_intent(Intent::BookingDetails);
        e.customer_name = Some("  ".to_string());
        e.service_name = Some("null".to_string());
        e.pets = vec![PetMention::named(" Max "), PetMention::named("")];
        let e = e.normalized();
        assert_eq!(e.customer_name, None);
        assert_eq!(e.service_name, None);
        assert_eq!(e.pets, vec![PetMention::named("Max")]);
    }
}
