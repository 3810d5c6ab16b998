//! Delivery batching: one combined message per subscriber per channel.

use crate::error::DeliveryError;
use crate::models::{FeedDescriptor, Posting, SubscriberProfile};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outbound email/SMS capability
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        text: &str,
    ) -> Result<(), DeliveryError>;

    async fn send_sms(&self, to: &str, text: &str) -> Result<(), DeliveryError>;
}

/// Maps a subscriber and feed to a URL minted by the account subsystem
pub type LinkBuilder = Arc<dyn Fn(&SubscriberProfile, &FeedDescriptor) -> String + Send + Sync>;

#[derive(Clone)]
pub struct LinkBuilders {
    pub edit: LinkBuilder,
    pub unsubscribe: LinkBuilder,
}

impl LinkBuilders {
    pub fn new(edit: LinkBuilder, unsubscribe: LinkBuilder) -> Self {
        Self { edit, unsubscribe }
    }

    /// Both links point at the page where a subscriber requests a fresh
    /// edit link by email.
    pub fn request_edit_link(app_base_url: &str) -> Self {
        let url = format!("{}/request-edit-link", app_base_url.trim_end_matches('/'));
        let edit_url = url.clone();
        Self {
            edit: Arc::new(move |_, _| edit_url.clone()),
            unsubscribe: Arc::new(move |_, _| url.clone()),
        }
    }
}

/// A composed notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub text: String,
    pub html: String,
}

fn plural_match(n: usize) -> &'static str {
    if n == 1 {
        "match"
    } else {
        "matches"
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Build subject, plain text and HTML bodies for `postings`
pub fn compose_message(
    label: &str,
    postings: &[Posting],
    edit_link: &str,
    unsubscribe_link: &str,
) -> Message {
    let n = postings.len();
    let subject = format!("[{label}] {n} new {} for you", plural_match(n));

    let mut lines = vec![format!("{label}: {n} new {}", plural_match(n))];
    for p in postings {
        let locations = if p.locations.is_empty() {
            String::new()
        } else {
            format!(" • {}", p.locations.join(", "))
        };
        lines.push(format!("- {} @ {}{} → {}", p.title, p.company_name, locations, p.url));
    }
    lines.push(String::new());
    lines.push(format!("Edit your preferences: {edit_link}"));
    lines.push(format!("Unsubscribe: {unsubscribe_link}"));
    lines.push("SMS: reply STOP to opt out.".to_string());
    let text = lines.join("\n");

    let items: String = postings
        .iter()
        .map(|p| {
            let locations = if p.locations.is_empty() {
                String::new()
            } else {
                format!(" &middot; {}", escape_html(&p.locations.join(", ")))
            };
            format!(
                "<li><a href=\"{}\">{}</a> @ {}{}</li>",
                escape_html(&p.url),
                escape_html(&p.title),
                escape_html(&p.company_name),
                locations
            )
        })
        .collect();

    let html = format!(
        "<div>\n  <p><strong>{}:</strong> {n} new {}</p>\n  <ul>{items}</ul>\n  <p><a href=\"{}\">Edit your preferences</a> &middot; <a href=\"{}\">Unsubscribe</a></p>\n</div>",
        escape_html(label),
        plural_match(n),
        escape_html(edit_link),
        escape_html(unsubscribe_link),
    );

    Message { subject, text, html }
}

/// Why nothing was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Unverified,
    NoPostings,
    NoChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// A precondition failed; nothing was dispatched
    Skipped(SkipReason),
    /// Channels were attempted; each flag is true when the provider accepted the message
    Dispatched { email: bool, sms: bool },
}

impl DeliveryOutcome {
    /// At least one channel accepted the message
    pub fn delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Dispatched { email, sms } if *email || *sms)
    }
}

#[derive(Clone)]
pub struct DeliveryBatcher {
    sender: Arc<dyn NotificationSender>,
    links: LinkBuilders,
}

impl DeliveryBatcher {
    pub fn new(sender: Arc<dyn NotificationSender>, links: LinkBuilders) -> Self {
        Self { sender, links }
    }

    /// Send one message per enabled channel covering all of `postings`.
    ///
    /// Failed preconditions are a silent no-op. Provider failures are
    /// logged and reported per channel, never returned as errors.
    pub async fn send_batch(
        &self,
        subscriber: &SubscriberProfile,
        feed: &FeedDescriptor,
        postings: &[Posting],
    ) -> DeliveryOutcome {
        if !subscriber.is_verified {
            return DeliveryOutcome::Skipped(SkipReason::Unverified);
        }
        if postings.is_empty() {
            return DeliveryOutcome::Skipped(SkipReason::NoPostings);
        }

        let email_to = subscriber.email_target();
        let sms_to = subscriber.sms_target();
        if email_to.is_none() && sms_to.is_none() {
            debug!(subscriber_id = %subscriber.id, "No usable channel, skipping delivery");
            return DeliveryOutcome::Skipped(SkipReason::NoChannel);
        }

        let edit_link = (self.links.edit)(subscriber, feed);
        let unsubscribe_link = (self.links.unsubscribe)(subscriber, feed);
        let message = compose_message(feed.label(), postings, &edit_link, &unsubscribe_link);

        let mut email = false;
        if let Some(to) = email_to {
            match self
                .sender
                .send_email(to, &message.subject, &message.html, &message.text)
                .await
            {
                Ok(()) => email = true,
                Err(e) => {
                    warn!(subscriber_id = %subscriber.id, error = %e, "Email delivery failed")
                }
            }
        }

        let mut sms = false;
        if let Some(to) = sms_to {
            match self.sender.send_sms(to, &message.text).await {
                Ok(()) => sms = true,
                Err(e) => warn!(subscriber_id = %subscriber.id, error = %e, "SMS delivery failed"),
            }
        }

        info!(
            subscriber_id = %subscriber.id,
            feed = %feed.name(),
            postings = postings.len(),
            email,
            sms,
            "Notification dispatched"
        );

        DeliveryOutcome::Dispatched { email, sms }
    }
}
