// 📣 Promoter Entity - a company that organises events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{compare_required, merge_text, union_list};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promoter {
    pub id: String,
    pub company_name: String,
    pub slug: String,
    pub description: Option<String>,

    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub social_links: Vec<String>,

    pub verified: bool,
    pub commercial: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Promoter {
    pub fn new(company_name: impl Into<String>, slug: impl Into<String>) -> Self {
        let now = Utc::now();

        Promoter {
            id: uuid::Uuid::new_v4().to_string(),
            company_name: company_name.into(),
            slug: slug.into(),
            description: None,
            email: None,
            phone: None,
            website: None,
            social_links: Vec::new(),
            verified: false,
            commercial: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn absorb(&mut self, duplicate: &Promoter) -> Vec<&'static str> {
        let mut conflicts = Vec::new();

        compare_required("companyName", &self.company_name, &duplicate.company_name, &mut conflicts);
        merge_text("description", &mut self.description, &duplicate.description, &mut conflicts);
        merge_text("email", &mut self.email, &duplicate.email, &mut conflicts);
        merge_text("phone", &mut self.phone, &duplicate.phone, &mut conflicts);
        merge_text("website", &mut self.website, &duplicate.website, &mut conflicts);
        union_list(&mut self.social_links, &duplicate.social_links);

        if self.verified != duplicate.verified {
            conflicts.push("verified");
        }
        if self.commercial != duplicate.commercial {
            conflicts.push("commercial");
        }

        conflicts
    }
}
