// 🔍 Similarity Scorer - how likely two same-kind listings are the same thing
//
// Each kind has a fixed, weighted set of comparable fields. A field earns
// its full weight on an exact normalized match and partial weight on
// containment/overlap. Fields empty on BOTH sides carry no evidence and are
// left out of the denominator; a field empty on one side scores zero.
//
// Pure and symmetric: score(a, b) == score(b, a).

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entities::{Event, Listing, Promoter, Vendor, Venue};

/// Credit for one side containing the other
const CONTAINMENT_CREDIT: f64 = 0.75;

/// Maximum credit for names that only share some significant words
const TOKEN_OVERLAP_CREDIT: f64 = 0.5;

/// Shortest word that counts as significant for token overlap
const MIN_TOKEN_LEN: usize = 3;

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Similarity {
    /// Weighted score in [0, 1]
    pub score: f64,

    /// Every field that contributed, highest contribution first
    pub matched_fields: Vec<String>,
}

impl Similarity {
    pub fn none() -> Self {
        Similarity {
            score: 0.0,
            matched_fields: Vec::new(),
        }
    }
}

struct FieldScore {
    field: &'static str,
    weight: f64,
    /// None = empty on both sides, excluded from the total
    credit: Option<f64>,
}

fn field(field: &'static str, weight: f64, credit: Option<f64>) -> FieldScore {
    FieldScore { field, weight, credit }
}

fn combine(fields: Vec<FieldScore>) -> Similarity {
    let total: f64 = fields
        .iter()
        .filter(|f| f.credit.is_some())
        .map(|f| f.weight)
        .sum();

    if total <= 0.0 {
        return Similarity::none();
    }

    let mut contributions: Vec<(&'static str, f64)> = fields
        .iter()
        .filter_map(|f| f.credit.map(|c| (f.field, c * f.weight)))
        .filter(|(_, amount)| *amount > 0.0)
        .collect();

    let earned: f64 = contributions.iter().map(|(_, amount)| amount).sum();

    // Stable sort: equal contributions keep declaration order
    contributions.sort_by(|a, b| b.1.total_cmp(&a.1));

    Similarity {
        score: (earned / total).clamp(0.0, 1.0),
        matched_fields: contributions.into_iter().map(|(name, _)| name.to_string()).collect(),
    }
}

// ============================================================================
// PER-KIND SCORING
// ============================================================================

/// Score two listings. None when they are of different kinds.
pub fn score(a: &Listing, b: &Listing) -> Option<Similarity> {
    match (a, b) {
        (Listing::Venue(a), Listing::Venue(b)) => Some(score_venues(a, b)),
        (Listing::Event(a), Listing::Event(b)) => Some(score_events(a, b)),
        (Listing::Vendor(a), Listing::Vendor(b)) => Some(score_vendors(a, b)),
        (Listing::Promoter(a), Listing::Promoter(b)) => Some(score_promoters(a, b)),
        _ => None,
    }
}

pub fn score_venues(a: &Venue, b: &Venue) -> Similarity {
    combine(vec![
        field("name", 3.0, Some(name_credit(&a.name, &b.name))),
        field(
            "address",
            2.0,
            compare_optional(&a.address, &b.address, |x, y| {
                contains_credit(&normalize_address(x), &normalize_address(y))
            }),
        ),
        field("city", 1.0, compare_optional(&a.city, &b.city, exact_text)),
        field("state", 1.0, compare_optional(&a.state, &b.state, exact_text)),
        field("zip", 1.0, compare_optional(&a.zip, &b.zip, zip_credit)),
    ])
}

pub fn score_events(a: &Event, b: &Event) -> Similarity {
    combine(vec![
        field("name", 3.0, Some(name_credit(&a.name, &b.name))),
        field(
            "dates",
            2.0,
            Some(date_overlap(a.start_date, a.last_day(), b.start_date, b.last_day())),
        ),
        field("venueId", 2.0, compare_optional(&a.venue_id, &b.venue_id, exact_id)),
        field("promoterId", 1.0, compare_optional(&a.promoter_id, &b.promoter_id, exact_id)),
    ])
}

pub fn score_vendors(a: &Vendor, b: &Vendor) -> Similarity {
    contact_fields(
        "businessName",
        (&a.business_name, &b.business_name),
        (&a.email, &b.email),
        (&a.phone, &b.phone),
        (&a.website, &b.website),
    )
}

pub fn score_promoters(a: &Promoter, b: &Promoter) -> Similarity {
    contact_fields(
        "companyName",
        (&a.company_name, &b.company_name),
        (&a.email, &b.email),
        (&a.phone, &b.phone),
        (&a.website, &b.website),
    )
}

type Both<'a, T> = (&'a T, &'a T);

fn contact_fields(
    name_field: &'static str,
    names: Both<String>,
    emails: Both<Option<String>>,
    phones: Both<Option<String>>,
    websites: Both<Option<String>>,
) -> Similarity {
    combine(vec![
        field(
            name_field,
            3.0,
            Some(name_credit(
                &strip_business_suffix(names.0),
                &strip_business_suffix(names.1),
            )),
        ),
        field("email", 2.0, compare_optional(emails.0, emails.1, email_credit)),
        field("phone", 2.0, compare_optional(phones.0, phones.1, phone_credit)),
        field("website", 2.0, compare_optional(websites.0, websites.1, website_credit)),
    ])
}

// ============================================================================
// FIELD COMPARATORS
// ============================================================================

fn compare_optional<F>(a: &Option<String>, b: &Option<String>, credit: F) -> Option<f64>
where
    F: Fn(&str, &str) -> f64,
{
    let a = a.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let b = b.as_deref().map(str::trim).filter(|s| !s.is_empty());
    match (a, b) {
        (None, None) => None,
        (Some(a), Some(b)) => Some(credit(a, b)),
        _ => Some(0.0),
    }
}

fn exact_text(a: &str, b: &str) -> f64 {
    if normalize_text(a) == normalize_text(b) {
        1.0
    } else {
        0.0
    }
}

fn exact_id(a: &str, b: &str) -> f64 {
    if a == b {
        1.0
    } else {
        0.0
    }
}

fn name_credit(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let contained = contains_credit(&a, &b);
    if contained > 0.0 {
        return contained;
    }

    let tokens_a: HashSet<&str> = a.split(' ').filter(|t| t.len() >= MIN_TOKEN_LEN).collect();
    let tokens_b: HashSet<&str> = b.split(' ').filter(|t| t.len() >= MIN_TOKEN_LEN).collect();
    let shared = tokens_a.intersection(&tokens_b).count();
    if shared == 0 {
        return 0.0;
    }
    let union = tokens_a.union(&tokens_b).count();
    TOKEN_OVERLAP_CREDIT * shared as f64 / union as f64
}

/// Full credit when equal, partial when one contains the other on word boundaries
fn contains_credit(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let padded_a = format!(" {} ", a);
    let padded_b = format!(" {} ", b);
    if padded_a.contains(&padded_b) || padded_b.contains(&padded_a) {
        CONTAINMENT_CREDIT
    } else {
        0.0
    }
}

fn zip_credit(a: &str, b: &str) -> f64 {
    let five = |s: &str| s.chars().filter(|c| c.is_ascii_digit()).take(5).collect::<String>();
    let (a, b) = (five(a), five(b));
    if !a.is_empty() && a == b {
        1.0
    } else {
        0.0
    }
}

fn email_credit(a: &str, b: &str) -> f64 {
    if a.trim().eq_ignore_ascii_case(b.trim()) {
        1.0
    } else {
        0.0
    }
}

fn phone_credit(a: &str, b: &str) -> f64 {
    match (normalize_phone(a), normalize_phone(b)) {
        (Some(a), Some(b)) if a == b => 1.0,
        _ => 0.0,
    }
}

fn website_credit(a: &str, b: &str) -> f64 {
    match (website_domain(a), website_domain(b)) {
        (Some(a), Some(b)) if a == b => 1.0,
        _ => 0.0,
    }
}

/// Jaccard overlap of two inclusive day ranges
fn date_overlap(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> f64 {
    if a_start == b_start && a_end == b_end {
        return 1.0;
    }
    let overlap_start = a_start.max(b_start);
    let overlap_end = a_end.min(b_end);
    if overlap_start > overlap_end {
        return 0.0;
    }
    let overlap = (overlap_end - overlap_start).num_days() + 1;
    let union = (a_end.max(b_end) - a_start.min(b_start)).num_days() + 1;
    overlap as f64 / union as f64
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Lowercase, drop apostrophes, punctuation → space, collapse whitespace
pub fn normalize_text(s: &str) -> String {
    let cleaned: String = s
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\'' && *c != '’')
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized text without a leading article ("The Fairgrounds" → "fairgrounds")
pub fn normalize_name(s: &str) -> String {
    let text = normalize_text(s);
    for article in ["the ", "a ", "an "] {
        if let Some(rest) = text.strip_prefix(article) {
            return rest.to_string();
        }
    }
    text
}

/// Normalized text with common street suffixes abbreviated
pub fn normalize_address(s: &str) -> String {
    normalize_text(s)
        .split(' ')
        .map(|word| match word {
            "street" => "st",
            "avenue" => "ave",
            "road" => "rd",
            "drive" => "dr",
            "boulevard" => "blvd",
            "lane" => "ln",
            "highway" => "hwy",
            "suite" => "ste",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop legal-form suffixes (LLC, Inc, Corp...) before comparing business names
fn strip_business_suffix(s: &str) -> String {
    const SUFFIXES: [&str; 7] = ["llc", "inc", "corp", "co", "ltd", "company", "incorporated"];
    let normalized = normalize_text(s);
    let mut words: Vec<&str> = normalized.split(' ').collect();
    while words.len() > 1 && words.last().map_or(false, |w| SUFFIXES.contains(w)) {
        words.pop();
    }
    words.join(" ")
}

/// Last ten digits of a phone number; None if fewer than seven digits
pub fn normalize_phone(s: &str) -> Option<String> {
    let digits: Vec<char> = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 7 {
        return None;
    }
    let start = digits.len().saturating_sub(10);
    Some(digits[start..].iter().collect())
}

/// Host of a website without `www.` ("https://www.Tacos.test/menu" → "tacos.test")
pub fn website_domain(s: &str) -> Option<String> {
    let trimmed = s.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let parsed = url::Url::parse(&with_scheme).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

// ============================================================================
// TESTS
// ============================================================================
