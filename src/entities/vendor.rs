// 🛒 Vendor Entity - a business that applies to sell at events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{compare_required, merge_text, union_list};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub id: String,
    pub business_name: String,
    pub slug: String,
    pub description: Option<String>,

    // Contact
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,

    /// What the vendor sells
    pub products: Vec<String>,

    pub verified: bool,
    pub commercial: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vendor {
    pub fn new(business_name: impl Into<String>, slug: impl Into<String>) -> Self {
        let now = Utc::now();

        Vendor {
            id: uuid::Uuid::new_v4().to_string(),
            business_name: business_name.into(),
            slug: slug.into(),
            description: None,
            email: None,
            phone: None,
            website: None,
            products: Vec::new(),
            verified: false,
            commercial: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn absorb(&mut self, duplicate: &Vendor) -> Vec<&'static str> {
        let mut conflicts = Vec::new();

        compare_required("businessName", &self.business_name, &duplicate.business_name, &mut conflicts);
        merge_text("description", &mut self.description, &duplicate.description, &mut conflicts);
        merge_text("email", &mut self.email, &duplicate.email, &mut conflicts);
        merge_text("phone", &mut self.phone, &duplicate.phone, &mut conflicts);
        merge_text("website", &mut self.website, &duplicate.website, &mut conflicts);
        union_list(&mut self.products, &duplicate.products);

        // Flags have no "empty" state: primary is kept as-is
        if self.verified != duplicate.verified {
            conflicts.push("verified");
        }
        if self.commercial != duplicate.commercial {
            conflicts.push("commercial");
        }

        conflicts
    }
}
