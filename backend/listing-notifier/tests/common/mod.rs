//! Shared fakes for pipeline tests
#![allow(dead_code)]

use async_trait::async_trait;
use listing_notifier::error::{DeliveryError, FeedError};
use listing_notifier::services::{FeedApi, FeedPoller, NotificationSender};
use listing_notifier::{FeedDescriptor, Posting, PreferenceSet, SubscriberProfile};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Default)]
pub struct RecordingSender {
    pub emails: Mutex<Vec<SentEmail>>,
    pub sms: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    pub fn emails(&self) -> Vec<SentEmail> {
        self.emails.lock().unwrap().clone()
    }

    pub fn email_count(&self) -> usize {
        self.emails.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        _html: &str,
        text: &str,
    ) -> Result<(), DeliveryError> {
        self.emails.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_sms(&self, to: &str, text: &str) -> Result<(), DeliveryError> {
        self.sms.lock().unwrap().push((to.to_string(), text.to_string()));
        Ok(())
    }
}

pub fn posting(id: &str, title: &str, locations: &[&str]) -> Posting {
    Posting {
        id: id.to_string(),
        title: title.to_string(),
        company_name: "Acme".to_string(),
        url: format!("https://acme.example/jobs/{id}"),
        locations: locations.iter().map(|s| s.to_string()).collect(),
        sponsorship: "Offers Sponsorship".to_string(),
        active: true,
        source: "Simplify".to_string(),
        date_posted: 1_700_000_000,
        date_updated: None,
        company_url: None,
        is_visible: Some(true),
        category: None,
        description: None,
    }
}

/// Render postings the way they appear when appended to the listings array
pub fn added_lines(postings: &[Posting]) -> Vec<String> {
    let mut lines = vec!["@@ -1,3 +1,40 @@".to_string(), " [".to_string()];
    for posting in postings {
        let pretty = serde_json::to_string_pretty(posting).unwrap();
        let count = pretty.lines().count();
        for (i, line) in pretty.lines().enumerate() {
            let suffix = if i + 1 == count { "," } else { "" };
            lines.push(format!("+  {line}{suffix}"));
        }
    }
    lines
}

pub fn subscriber(id: &str, prefs: PreferenceSet) -> SubscriberProfile {
    SubscriberProfile {
        id: id.to_string(),
        email: Some(format!("{id}@example.com")),
        phone: None,
        notify_email: true,
        notify_sms: false,
        is_verified: true,
        preferences: prefs,
    }
}

pub fn receive_all_both_feeds() -> PreferenceSet {
    PreferenceSet {
        subscribe_new_grad: true,
        subscribe_internship: true,
        receive_all: true,
        ..Default::default()
    }
}

/// Commit history served newest first; tests append commits between runs
#[derive(Default)]
pub struct FakeHistory {
    commits: Mutex<Vec<(String, Vec<String>)>>,
    fail_list: Mutex<bool>,
}

impl FakeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_commit(&self, sha: &str, postings: &[Posting]) {
        self.commits
            .lock()
            .unwrap()
            .insert(0, (sha.to_string(), added_lines(postings)));
    }

    pub fn set_list_failure(&self, fail: bool) {
        *self.fail_list.lock().unwrap() = fail;
    }
}

#[async_trait]
impl FeedApi for FakeHistory {
    async fn list_commits(&self, _branch: &str, per_page: u32) -> Result<Vec<String>, FeedError> {
        if *self.fail_list.lock().unwrap() {
            return Err(FeedError::Http { status: 503 });
        }
        Ok(self
            .commits
            .lock()
            .unwrap()
            .iter()
            .take(per_page as usize)
            .map(|(sha, _)| sha.clone())
            .collect())
    }

    async fn commit_patch(
        &self,
        sha: &str,
        _file_suffix: &str,
    ) -> Result<Option<Vec<String>>, FeedError> {
        Ok(self
            .commits
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _)| s == sha)
            .map(|(_, lines)| lines.clone()))
    }
}

/// Delegates to a shared history so a test can keep mutating it
pub struct SharedHistory(pub std::sync::Arc<FakeHistory>);

#[async_trait]
impl FeedApi for SharedHistory {
    async fn list_commits(&self, branch: &str, per_page: u32) -> Result<Vec<String>, FeedError> {
        self.0.list_commits(branch, per_page).await
    }

    async fn commit_patch(
        &self,
        sha: &str,
        file_suffix: &str,
    ) -> Result<Option<Vec<String>>, FeedError> {
        self.0.commit_patch(sha, file_suffix).await
    }
}

pub fn poller(
    history: std::sync::Arc<FakeHistory>,
    feed: FeedDescriptor,
) -> FeedPoller<SharedHistory> {
    FeedPoller::new(SharedHistory(history), feed, 100)
}
