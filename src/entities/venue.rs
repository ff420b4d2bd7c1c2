// 🏟️ Venue Entity - a physical place that hosts events
//
// Identity: id (never changes), slug (unique among venues)
// Values: name, address/geo, amenities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{compare_required, merge_text, merge_value, union_list};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub slug: String,

    // ========================================================================
    // ADDRESS / GEO
    // ========================================================================
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub description: Option<String>,
    pub website: Option<String>,

    /// Parking, restrooms, power hookups...
    pub amenities: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Venue {
    /// Create new venue with a fresh UUID
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        let now = Utc::now();

        Venue {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            slug: slug.into(),
            address: None,
            city: None,
            state: None,
            zip: None,
            latitude: None,
            longitude: None,
            description: None,
            website: None,
            amenities: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style address setter (used by importers and tests)
    pub fn located_at(mut self, address: &str, city: &str, state: &str, zip: &str) -> Self {
        self.address = Some(address.to_string());
        self.city = Some(city.to_string());
        self.state = Some(state.to_string());
        self.zip = Some(zip.to_string());
        self
    }

    pub(crate) fn absorb(&mut self, duplicate: &Venue) -> Vec<&'static str> {
        let mut conflicts = Vec::new();

        compare_required("name", &self.name, &duplicate.name, &mut conflicts);
        merge_text("address", &mut self.address, &duplicate.address, &mut conflicts);
        merge_text("city", &mut self.city, &duplicate.city, &mut conflicts);
        merge_text("state", &mut self.state, &duplicate.state, &mut conflicts);
        merge_text("zip", &mut self.zip, &duplicate.zip, &mut conflicts);

        // Coordinates travel as a pair
        if self.latitude.is_none() && self.longitude.is_none() {
            self.latitude = duplicate.latitude;
            self.longitude = duplicate.longitude;
        } else {
            let mut geo = Vec::new();
            merge_value("latitude", &mut self.latitude, &duplicate.latitude, &mut geo);
            merge_value("longitude", &mut self.longitude, &duplicate.longitude, &mut geo);
            if !geo.is_empty() {
                conflicts.push("coordinates");
            }
        }

        merge_text("description", &mut self.description, &duplicate.description, &mut conflicts);
        merge_text("website", &mut self.website, &duplicate.website, &mut conflicts);
        union_list(&mut self.amenities, &duplicate.amenities);

        conflicts
    }
}
