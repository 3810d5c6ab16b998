pub mod delivery;
pub mod enrich;
pub mod extractor;
pub mod feed_poller;
pub mod matcher;
pub mod orchestrator;
pub mod senders;

pub use delivery::{
    compose_message, DeliveryBatcher, DeliveryOutcome, LinkBuilder, LinkBuilders,
    NotificationSender,
};
pub use enrich::{enrich_descriptions, HttpDescriptionEnricher, PostingEnricher};
pub use extractor::extract_postings;
pub use feed_poller::{FeedApi, FeedPoller, FeedSource, GithubFeedApi, PollOutcome};
pub use matcher::matches;
pub use orchestrator::{Enrichment, FeedJob, FeedRunReport, FeedRunner, Orchestrator};
pub use senders::ChannelSender;
