use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DateRange, ExtractedEntities, Intent, MatchedService, PetMention};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    #[default]
    Collecting,
    ReadyToExecute,
    Executing,
    Completed,
}

impl GateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateState::Collecting => "collecting",
            GateState::ReadyToExecute => "ready_to_execute",
            GateState::Executing => "executing",
            GateState::Completed => "completed",
        }
    }
}

/// Booking details collected from the chat but not yet written anywhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingBuffer {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub pets: Vec<PetMention>,
    pub service_name: Option<String>,
    pub start_date_phrase: Option<String>,
    pub end_date_phrase: Option<String>,
    pub notes: Option<String>,
}

impl BookingBuffer {
    /// Later mentions win for scalar fields; pets accumulate by name.
    pub fn merge(&mut self, entities: &ExtractedEntities) {
        if entities.customer_name.is_some() {
            self.customer_name = entities.customer_name.clone();
        }
        if entities.customer_email.is_some() {
            self.customer_email = entities.customer_email.clone();
        }
        if entities.customer_phone.is_some() {
            self.customer_phone = entities.customer_phone.clone();
        }
        if entities.service_name.is_some() {
            self.service_name = entities.service_name.clone();
        }
        if entities.start_date_phrase.is_some() {
            self.start_date_phrase = entities.start_date_phrase.clone();
            // A fresh start phrase invalidates an end phrase given for an older one.
            self.end_date_phrase = entities.end_date_phrase.clone();
        } else if entities.end_date_phrase.is_some() {
            self.end_date_phrase = entities.end_date_phrase.clone();
        }
        if entities.notes.is_some() {
            self.notes = entities.notes.clone();
        }

        for mention in &entities.pets {
            match self
                .pets
                .iter_mut()
                .find(|p| p.name.eq_ignore_ascii_case(&mention.name))
            {
                Some(existing) => {
                    if mention.species.is_some() {
                        existing.species = mention.species.clone();
                    }
                    if mention.breed.is_some() {
                        existing.breed = mention.breed.clone();
                    }
                }
                None => self.pets.push(mention.clone()),
            }
        }
    }

    pub fn has_customer(&self) -> bool {
        self.customer_name.is_some() || self.customer_email.is_some() || self.customer_phone.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedPet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub species: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSession {
    pub thread_id: String,
    pub customer_id: Option<String>,
    /// Name the cached customer was confirmed under.
    pub customer_name: Option<String>,
    pub pets: Vec<CachedPet>,
    pub service: Option<MatchedService>,
    pub booking_id: Option<String>,
    pub date_range: Option<DateRange>,
    pub last_intent: Option<Intent>,
    pub gate: GateState,
    pub buffer: BookingBuffer,
    pub messages: Vec<ConversationMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(thread_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            customer_id: None,
            customer_name: None,
            pets: Vec::new(),
            service: None,
            booking_id: None,
            date_range: None,
            last_intent: None,
            gate: GateState::Collecting,
            buffer: BookingBuffer::default(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn pet_ids(&self) -> Vec<String> {
        self.pets.iter().map(|p| p.id.clone()).collect()
    }

    pub fn cached_pet(&self, name: &str) -> Option<&CachedPet> {
        self.pets.iter().find(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn has_customer_reference(&self) -> bool {
        self.customer_id.is_some() || self.buffer.has_customer()
    }

    pub fn has_pet_reference(&self) -> bool {
        !self.pets.is_empty() || !self.buffer.pets.is_empty()
    }

    /// Keeps at most `limit` messages, dropping the oldest.
    pub fn push_message(&mut self, role: &str, content: &str, limit: usize) {
        self.messages.push(ConversationMessage {
            role: role.to_string(),
            content: content.to_string(),
        });
        if self.messages.len() > limit {
            let excess = self.messages.len() - limit;
            self.messages.drain(..excess);
        }
    }
}
