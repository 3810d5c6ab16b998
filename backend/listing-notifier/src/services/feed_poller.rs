//! Feed polling: commit history since a cursor, turned into postings.
//!
//! The remote API is behind [`FeedApi`] so the poller's cursor and
//! degradation rules can be exercised without a network.

use crate::config::GithubSettings;
use crate::error::FeedError;
use crate::models::{FeedDescriptor, Posting};
use crate::services::extractor::extract_postings;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client as HttpClient;
use resilience::{with_retry_if, RetryConfig, ServiceConfig};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Remote commit history of one feed
#[async_trait]
pub trait FeedApi: Send + Sync {
    /// Commit SHAs on `branch`, newest first, at most `per_page`
    async fn list_commits(&self, branch: &str, per_page: u32) -> Result<Vec<String>, FeedError>;

    /// Patch lines of the file ending in `file_suffix` touched by commit `sha`.
    ///
    /// `Ok(None)` when the commit does not touch that file.
    async fn commit_patch(
        &self,
        sha: &str,
        file_suffix: &str,
    ) -> Result<Option<Vec<String>>, FeedError>;
}

#[derive(Deserialize)]
struct CommitSummary {
    sha: String,
}

#[derive(Deserialize)]
struct CommitDetail {
    #[serde(default)]
    files: Vec<CommitFile>,
}

#[derive(Deserialize)]
struct CommitFile {
    filename: String,
    #[serde(default)]
    patch: Option<String>,
}

/// Build the HTTP client shared by every feed
pub fn build_http_client(preset: &ServiceConfig) -> Result<HttpClient, FeedError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
    headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));

    let client = HttpClient::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .connect_timeout(preset.connect_timeout)
        .timeout(preset.timeout.duration)
        .build()?;
    Ok(client)
}

/// GitHub REST API client for one repository
#[derive(Clone)]
pub struct GithubFeedApi {
    client: HttpClient,
    base_url: String,
    token: Option<String>,
    retry: Option<RetryConfig>,
}

impl GithubFeedApi {
    pub fn new(
        client: HttpClient,
        settings: &GithubSettings,
        feed: &FeedDescriptor,
        retry: Option<RetryConfig>,
    ) -> Self {
        Self {
            client,
            base_url: format!("{}/repos/{}/{}", settings.api_url, feed.owner, feed.repo),
            token: settings.token.clone(),
            retry,
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FeedError> {
        let mut request = self.client.get(url).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Http {
                status: status.as_u16(),
            });
        }

        Ok(response.json::<T>().await?)
    }

    /// GET with retry on transient failures only
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FeedError> {
        match &self.retry {
            Some(config) => with_retry_if(config.clone(), FeedError::is_transient, || {
                self.get_once::<T>(url, query)
            })
            .await
            .map_err(|e| e.into_inner()),
            None => self.get_once(url, query).await,
        }
    }
}

#[async_trait]
impl FeedApi for GithubFeedApi {
    async fn list_commits(&self, branch: &str, per_page: u32) -> Result<Vec<String>, FeedError> {
        let url = format!("{}/commits", self.base_url);
        let query = [("sha", branch.to_string()), ("per_page", per_page.to_string())];
        let commits: Vec<CommitSummary> = self.get_json(&url, &query).await?;
        Ok(commits.into_iter().map(|c| c.sha).collect())
    }

    async fn commit_patch(
        &self,
        sha: &str,
        file_suffix: &str,
    ) -> Result<Option<Vec<String>>, FeedError> {
        let url = format!("{}/commits/{}", self.base_url, sha);
        let detail: CommitDetail = self.get_json(&url, &[]).await?;

        Ok(detail
            .files
            .into_iter()
            .filter(|f| f.filename.ends_with(file_suffix))
            .find_map(|f| f.patch)
            .map(|patch| patch.lines().map(str::to_string).collect()))
    }
}

/// What one poll produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Postings from new commits, newest commit first, diff order within a commit
    pub postings: Vec<Posting>,
    /// Newest commit observed, or the input cursor when nothing was new
    pub cursor: Option<String>,
    pub commits_processed: usize,
    /// New commits whose diff could not be fetched
    pub commits_skipped: usize,
}

/// Source of new postings since a cursor
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Never fails: remote failures degrade to fewer or no postings with
    /// the cursor left where it was.
    async fn fetch_new_listings(&self, since: Option<&str>) -> PollOutcome;
}

/// Prefix of a newest-first list strictly newer than `since`.
///
/// If `since` is absent or not on this page, the whole page counts as new.
/// History older than one page is never walked.
pub fn commits_since(commits: Vec<String>, since: Option<&str>) -> Vec<String> {
    match since {
        Some(since) => commits.into_iter().take_while(|sha| sha != since).collect(),
        None => commits,
    }
}

pub struct FeedPoller<A> {
    api: A,
    feed: FeedDescriptor,
    page_size: u32,
}

impl<A: FeedApi> FeedPoller<A> {
    pub fn new(api: A, feed: FeedDescriptor, page_size: u32) -> Self {
        Self { api, feed, page_size }
    }
}

#[async_trait]
impl<A: FeedApi> FeedSource for FeedPoller<A> {
    async fn fetch_new_listings(&self, since: Option<&str>) -> PollOutcome {
        let feed_name = self.feed.name();
        let unchanged = PollOutcome {
            cursor: since.map(str::to_string),
            ..Default::default()
        };

        let commits = match self.api.list_commits(&self.feed.branch, self.page_size).await {
            Ok(commits) => commits,
            Err(e) => {
                warn!(feed = %feed_name, error = %e, "Failed to list commits, keeping cursor");
                return unchanged;
            }
        };

        if since.is_some_and(|s| !commits.iter().any(|c| c == s)) {
            warn!(
                feed = %feed_name,
                since = since.unwrap_or_default(),
                page = commits.len(),
                "Cursor not on the first page, treating the whole page as new"
            );
        }

        let new_commits = commits_since(commits, since);
        let Some(newest) = new_commits.first().cloned() else {
            debug!(feed = %feed_name, "No new commits");
            return unchanged;
        };

        let mut outcome = PollOutcome {
            cursor: Some(newest),
            ..Default::default()
        };

        for sha in &new_commits {
            match self.api.commit_patch(sha, &self.feed.listings_suffix).await {
                Ok(Some(lines)) => {
                    let postings = extract_postings(&lines);
                    debug!(
                        feed = %feed_name,
                        sha = %sha,
                        postings = postings.len(),
                        "Commit extracted"
                    );
                    outcome.postings.extend(postings);
                    outcome.commits_processed += 1;
                }
                Ok(None) => {
                    debug!(
                        feed = %feed_name,
                        sha = %sha,
                        "Commit does not touch the listings file"
                    );
                    outcome.commits_processed += 1;
                }
                Err(e) => {
                    warn!(
                        feed = %feed_name,
                        sha = %sha,
                        error = %e,
                        "Skipping commit, diff fetch failed"
                    );
                    outcome.commits_skipped += 1;
                }
            }
        }

        info!(
            feed = %feed_name,
            commits = new_commits.len(),
            skipped = outcome.commits_skipped,
            postings = outcome.postings.len(),
            "Poll finished"
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    enum Patch {
        Lines(Vec<String>),
        Untouched,
        Fails(u16),
    }

    struct ScriptedApi {
        commits: Result<Vec<String>, u16>,
        patches: HashMap<String, Patch>,
        requested: Mutex<Vec<String>>,
    }

    impl ScriptedApi {
        fn new(commits: &[&str]) -> Self {
            Self {
                commits: Ok(commits.iter().map(|s| s.to_string()).collect()),
                patches: HashMap::new(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn with_patch(mut self, sha: &str, patch: Patch) -> Self {
            self.patches.insert(sha.to_string(), patch);
            self
        }
    }

    #[async_trait]
    impl FeedApi for ScriptedApi {
        async fn list_commits(
            &self,
            _branch: &str,
            _per_page: u32,
        ) -> Result<Vec<String>, FeedError> {
            self.commits.clone().map_err(|status| FeedError::Http { status })
        }

        async fn commit_patch(
            &self,
            sha: &str,
            _suffix: &str,
        ) -> Result<Option<Vec<String>>, FeedError> {
            self.requested.lock().unwrap().push(sha.to_string());
            match self.patches.get(sha) {
                Some(Patch::Lines(lines)) => Ok(Some(lines.clone())),
                Some(Patch::Fails(status)) => Err(FeedError::Http { status: *status }),
                Some(Patch::Untouched) | None => Ok(None),
            }
        }
    }

    fn added_posting(id: &str) -> Vec<String> {
        vec![
            "+  {".to_string(),
            format!("+    \"id\": \"{id}\","),
            format!("+    \"title\": \"Engineer {id}\","),
            "+    \"company_name\": \"Acme\",".to_string(),
            "+    \"url\": \"https://acme.example\",".to_string(),
            "+    \"sponsorship\": \"Other\",".to_string(),
            "+    \"active\": true,".to_string(),
            "+    \"source\": \"Simplify\",".to_string(),
            "+    \"date_posted\": 1700000000".to_string(),
            "+  },".to_string(),
        ]
    }

    fn poller(api: ScriptedApi) -> FeedPoller<ScriptedApi> {
        FeedPoller::new(api, FeedDescriptor::new_grad(), 100)
    }

    #[test]
    fn test_commits_since() {
        let page = || vec!["c3".to_string(), "c2".to_string(), "c1".to_string()];
        assert_eq!(commits_since(page(), Some("c2")), vec!["c3"]);
        assert!(commits_since(page(), Some("c3")).is_empty());
        assert_eq!(commits_since(page(), Some("gone")).len(), 3);
        assert_eq!(commits_since(page(), None).len(), 3);
    }

    #[tokio::test]
    async fn test_new_commits_newest_first() {
        let api = ScriptedApi::new(&["c3", "c2", "c1"])
            .with_patch("c3", Patch::Lines(added_posting("p3")))
            .with_patch("c2", Patch::Lines(added_posting("p2")));

        let outcome = poller(api).fetch_new_listings(Some("c1")).await;
        let ids: Vec<_> = outcome.postings.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p2"]);
        assert_eq!(outcome.cursor.as_deref(), Some("c3"));
        assert_eq!(outcome.commits_processed, 2);
    }

    #[tokio::test]
    async fn test_nothing_new_keeps_cursor() {
        let api = ScriptedApi::new(&["c3", "c2"]);
        let poller = poller(api);
        let outcome = poller.fetch_new_listings(Some("c3")).await;
        assert!(outcome.postings.is_empty());
        assert_eq!(outcome.cursor.as_deref(), Some("c3"));
        assert!(poller.api.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_failure_is_a_safe_noop() {
        let mut api = ScriptedApi::new(&[]);
        api.commits = Err(503);
        let outcome = poller(api).fetch_new_listings(Some("c1")).await;
        assert!(outcome.postings.is_empty());
        assert_eq!(outcome.cursor.as_deref(), Some("c1"));
        assert_eq!(outcome.commits_processed, 0);
    }

    #[tokio::test]
    async fn test_diff_failure_skips_only_that_commit() {
        let api = ScriptedApi::new(&["c3", "c2", "c1"])
            .with_patch("c3", Patch::Lines(added_posting("p3")))
            .with_patch("c2", Patch::Fails(502))
            .with_patch("c1", Patch::Untouched);

        let outcome = poller(api).fetch_new_listings(None).await;
        assert_eq!(outcome.postings.len(), 1);
        assert_eq!(outcome.cursor.as_deref(), Some("c3"));
        assert_eq!(outcome.commits_processed, 2);
        assert_eq!(outcome.commits_skipped, 1);
    }

    #[tokio::test]
    async fn test_unknown_cursor_takes_whole_page() {
        let api = ScriptedApi::new(&["c3", "c2"])
            .with_patch("c3", Patch::Lines(added_posting("p3")))
            .with_patch("c2", Patch::Lines(added_posting("p2")));
        let outcome = poller(api).fetch_new_listings(Some("ancient")).await;
        assert_eq!(outcome.postings.len(), 2);
        assert_eq!(outcome.cursor.as_deref(), Some("c3"));
    }

    #[tokio::test]
    async fn test_empty_history_without_cursor() {
        let outcome = poller(ScriptedApi::new(&[])).fetch_new_listings(None).await;
        assert_eq!(outcome, PollOutcome::default());
    }
}
