//! Name matching between chat mentions and remote records.
//!
//! Everything here is case-insensitive and pure; callers decide what a miss means.

use crate::models::{Customer, Pet, Service};

/// Minimum normalized Levenshtein similarity for a pet name typo to match.
pub const PET_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Minimum similarity for a service name to be considered at all when no
/// keyword or substring rule fires.
pub const SERVICE_SIMILARITY_THRESHOLD: f64 = 0.6;

const SERVICE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "pet sitting",
        &[
            "pet sitting",
            "pet sitter",
            "sitting",
            "overnight",
            "overnight care",
            "watch",
            "look after",
            "care for",
            "pet care",
            "dog sitting",
            "cat sitting",
            "babysit",
            "stay with",
            "house sit",
        ],
    ),
    (
        "dog walking",
        &[
            "dog walking",
            "dog walker",
            "walk",
            "walk my dog",
            "dog walk",
            "take dog out",
            "daily walk",
        ],
    ),
    (
        "grooming",
        &[
            "grooming",
            "groom",
            "bath",
            "bathe",
            "wash",
            "nail trim",
            "nail clipping",
            "haircut",
            "hair cut",
            "trim",
        ],
    ),
];

const STOP_WORDS: &[&str] = &["pet", "my", "the", "a", "an", "for", "of", "with"];

/// Email beats phone beats name, regardless of list order.
pub fn match_customer<'a>(
    customers: &'a [Customer],
    email: Option<&str>,
    phone: Option<&str>,
    name: Option<&str>,
) -> Option<&'a Customer> {
    if let Some(email) = email.filter(|e| !e.is_empty()) {
        if let Some(c) = customers.iter().find(|c| {
            c.email
                .as_deref()
                .is_some_and(|ce| ce.eq_ignore_ascii_case(email))
        }) {
            return Some(c);
        }
    }

    if let Some(phone) = phone.map(normalize_phone).filter(|p| !p.is_empty()) {
        if let Some(c) = customers.iter().find(|c| {
            c.phone
                .as_deref()
                .is_some_and(|cp| normalize_phone(cp) == phone)
        }) {
            return Some(c);
        }
    }

    let name = name.map(|n| n.trim().to_lowercase()).filter(|n| !n.is_empty())?;
    customers.iter().find(|c| {
        let full = c.full_name().to_lowercase();
        !full.is_empty() && names_compatible(&full, &name)
    })
}

/// Exact name, then closest typo above the threshold, then substring.
pub fn match_pet<'a>(pets: &'a [Pet], name: &str) -> Option<&'a Pet> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    if let Some(p) = pets.iter().find(|p| p.name.trim().to_lowercase() == wanted) {
        return Some(p);
    }

    let mut best: Option<(&Pet, f64)> = None;
    for pet in pets {
        let existing = pet.name.trim().to_lowercase();
        if existing.is_empty() {
            continue;
        }
        let score = strsim::normalized_levenshtein(&wanted, &existing);
        if score >= PET_SIMILARITY_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((pet, score));
        }
    }
    if let Some((pet, _)) = best {
        return Some(pet);
    }

    pets.iter().find(|p| {
        let existing = p.name.trim().to_lowercase();
        !existing.is_empty() && (existing.contains(&wanted) || wanted.contains(&existing))
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceMatch<'a> {
    pub service: &'a Service,
    pub score: u32,
}

/// Picks the highest-scoring service; the first listed wins exact ties.
pub fn match_service<'a>(services: &'a [Service], request: &str) -> Option<ServiceMatch<'a>> {
    let request = normalize_phrase(request);
    if request.is_empty() {
        return None;
    }

    let mut best: Option<ServiceMatch<'a>> = None;
    for service in services {
        let score = score_service(&service.name, &request);
        if score == 0 {
            continue;
        }
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(ServiceMatch { service, score });
        }
    }
    best
}

fn score_service(name: &str, request: &str) -> u32 {
    let name = normalize_phrase(name);
    if name.is_empty() {
        return 0;
    }

    let mut score = if name == request {
        1000
    } else if name.contains(request) || request.contains(&name) {
        900
    } else {
        0
    };

    for (family, keywords) in SERVICE_KEYWORDS {
        if !name.contains(family) {
            continue;
        }
        // Earlier keywords are more specific and score higher.
        if let Some(idx) = keywords.iter().position(|kw| request.contains(kw)) {
            let priority = (keywords.len() - idx) as u32 * 10;
            score = score.max(500 + priority);
        }
    }

    if score < 500 {
        let similarity = strsim::normalized_levenshtein(&name, request);
        if similarity >= SERVICE_SIMILARITY_THRESHOLD {
            score = score.max((similarity * 400.0) as u32);
        }

        let overlap = name
            .split_whitespace()
            .filter(|w| !STOP_WORDS.contains(w))
            .filter(|w| request.split_whitespace().any(|r| r == *w))
            .count() as u32;
        score = score.max(overlap * 10);
    }

    score
}

/// Lowercased, trimmed, with inner whitespace collapsed.
pub fn normalize_phrase(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Two customer names refer to the same person if one contains the other,
/// so "Jane" and "Jane Doe" are compatible but "Jane" and "John" are not.
pub fn names_compatible(a: &str, b: &str) -> bool {
    let a = normalize_phrase(a);
    let b = normalize_phrase(b);
    !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
}

fn normalize_phone(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}
