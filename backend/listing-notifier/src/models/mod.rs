use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A job posting as published in a listings feed.
///
/// Unknown keys in the upstream JSON are ignored so new upstream fields do
/// not break extraction. A missing `locations` key decodes as no locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Posting {
    /// Feed-assigned identity, unique within a feed
    pub id: String,
    pub title: String,
    pub company_name: String,
    pub url: String,
    #[serde(default)]
    pub locations: Vec<String>,
    pub sponsorship: String,
    pub active: bool,
    pub source: String,
    /// Epoch seconds
    pub date_posted: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Job description text, only present after enrichment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Posting {
    /// Copy of this posting carrying `description`
    pub fn with_description(&self, description: Option<String>) -> Posting {
        Posting {
            description,
            ..self.clone()
        }
    }
}

/// The listings feeds a subscriber can follow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    /// Full-time new graduate positions
    NewGrad,
    /// Internship positions
    Internship,
}

impl FeedKind {
    /// Human-readable label used in notification subjects
    pub fn label(&self) -> &'static str {
        match self {
            FeedKind::NewGrad => "New Grad",
            FeedKind::Internship => "Internships",
        }
    }
}

/// Where a feed lives upstream and how to find its listings file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDescriptor {
    pub kind: FeedKind,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub listings_suffix: String,
}

impl FeedDescriptor {
    pub fn new(kind: FeedKind, owner: &str, repo: &str) -> Self {
        Self {
            kind,
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: "dev".to_string(),
            listings_suffix: "listings.json".to_string(),
        }
    }

    pub fn new_grad() -> Self {
        Self::new(FeedKind::NewGrad, "SimplifyJobs", "New-Grad-Positions")
    }

    pub fn internship() -> Self {
        Self::new(FeedKind::Internship, "SimplifyJobs", "Summer2026-Internships")
    }

    /// Both feeds polled by a run
    pub fn all() -> Vec<Self> {
        vec![Self::new_grad(), Self::internship()]
    }

    /// Feed name, also the cursor key: `owner/repo`
    pub fn name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    /// Lease name guarding a poll of this feed
    pub fn lock_name(&self) -> String {
        format!("poll:{}", self.name())
    }
}

/// What a subscriber wants to hear about
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreferenceSet {
    pub subscribe_new_grad: bool,
    pub subscribe_internship: bool,
    /// Match every posting, ignoring all keyword sets
    pub receive_all: bool,
    pub tech_keywords: BTreeSet<String>,
    pub role_keywords: BTreeSet<String>,
    pub location_keywords: BTreeSet<String>,
}

impl PreferenceSet {
    /// Subscription is per feed, not global
    pub fn subscribes_to(&self, kind: FeedKind) -> bool {
        match kind {
            FeedKind::NewGrad => self.subscribe_new_grad,
            FeedKind::Internship => self.subscribe_internship,
        }
    }

    /// True when matching may look at title, company or description text
    pub fn has_content_keywords(&self) -> bool {
        !self.receive_all
            && self
                .tech_keywords
                .iter()
                .chain(&self.role_keywords)
                .any(|k| !k.trim().is_empty())
    }
}

/// A subscriber as read by the pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriberProfile {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notify_email: bool,
    pub notify_sms: bool,
    pub is_verified: bool,
    pub preferences: PreferenceSet,
}

impl SubscriberProfile {
    /// Email address to deliver to, if the email channel is enabled and usable
    pub fn email_target(&self) -> Option<&str> {
        if !self.notify_email {
            return None;
        }
        self.email.as_deref().filter(|e| !e.trim().is_empty())
    }

    /// Phone number to deliver to, if the SMS channel is enabled and usable
    pub fn sms_target(&self) -> Option<&str> {
        if !self.notify_sms {
            return None;
        }
        self.phone.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// Outcome counters for one feed run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunStats {
    pub feed_name: String,
    pub cursor_before: Option<String>,
    pub cursor_after: Option<String>,
    pub postings_considered: usize,
    pub subscribers_notified: usize,
    pub postings_sent_total: usize,
    pub commits_processed: usize,
    pub commits_skipped: usize,
}
