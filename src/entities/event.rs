// 🎪 Event Entity - a dated happening, optionally hosted at a venue and owned by a promoter

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{compare_required, merge_text, merge_value, union_list};

// ============================================================================
// EVENT STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "DRAFT",
            EventStatus::Published => "PUBLISHED",
            EventStatus::Cancelled => "CANCELLED",
            EventStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<EventStatus> {
        match s {
            "DRAFT" => Some(EventStatus::Draft),
            "PUBLISHED" => Some(EventStatus::Published),
            "CANCELLED" => Some(EventStatus::Cancelled),
            "COMPLETED" => Some(EventStatus::Completed),
            _ => None,
        }
    }
}

// ============================================================================
// EVENT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,

    pub start_date: NaiveDate,
    /// None = single-day event
    pub end_date: Option<NaiveDate>,
    pub status: EventStatus,

    pub venue_id: Option<String>,
    pub promoter_id: Option<String>,

    pub tags: Vec<String>,
    pub categories: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, start_date: NaiveDate) -> Self {
        let now = Utc::now();

        Event {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            slug: slug.into(),
            description: None,
            start_date,
            end_date: None,
            status: EventStatus::Draft,
            venue_id: None,
            promoter_id: None,
            tags: Vec::new(),
            categories: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Last day of the event (inclusive)
    pub fn last_day(&self) -> NaiveDate {
        self.end_date.unwrap_or(self.start_date).max(self.start_date)
    }

    pub(crate) fn absorb(&mut self, duplicate: &Event) -> Vec<&'static str> {
        let mut conflicts = Vec::new();

        compare_required("name", &self.name, &duplicate.name, &mut conflicts);
        merge_text("description", &mut self.description, &duplicate.description, &mut conflicts);

        if self.start_date != duplicate.start_date {
            conflicts.push("startDate");
        }
        merge_value("endDate", &mut self.end_date, &duplicate.end_date, &mut conflicts);
        if self.status != duplicate.status {
            conflicts.push("status");
        }

        merge_text("venueId", &mut self.venue_id, &duplicate.venue_id, &mut conflicts);
        merge_text("promoterId", &mut self.promoter_id, &duplicate.promoter_id, &mut conflicts);

        union_list(&mut self.tags, &duplicate.tags);
        union_list(&mut self.categories, &duplicate.categories);

        conflicts
    }
}
