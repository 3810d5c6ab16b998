use anyhow::Context;
use db_pool::create_pool;
use lease_lock::{owner_token, PgLeaseStore, RunLock};
use listing_notifier::repository::{PgCursorStore, PgSentLedger, PgSubscriberRepository};
use listing_notifier::services::feed_poller::build_http_client;
use listing_notifier::services::{
    ChannelSender, DeliveryBatcher, Enrichment, FeedJob, FeedPoller, FeedRunReport, FeedRunner,
    GithubFeedApi, HttpDescriptionEnricher, LinkBuilders, Orchestrator,
};
use listing_notifier::{Config, FeedDescriptor, MIGRATOR};
use resilience::{http_enrichment_config, http_external_config, with_timeout};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,listing_notifier=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Exits successfully whatever happens: the next scheduled run is the retry.
#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Invalid configuration, nothing polled");
            return ExitCode::SUCCESS;
        }
    };

    let ceiling = config.run.ceiling();
    info!(ceiling_secs = ceiling.as_secs(), "Starting poll-once");

    match with_timeout(ceiling, run(config)).await {
        Ok(Ok(())) => info!("poll-once finished"),
        Ok(Err(e)) => error!(error = %format!("{e:#}"), "poll-once aborted"),
        Err(e) => error!(error = %e, "poll-once hit its run ceiling; held leases will expire"),
    }

    ExitCode::SUCCESS
}

async fn run(config: Config) -> anyhow::Result<()> {
    config.database.log_config();
    let pool = create_pool(config.database.clone())
        .await
        .context("Failed to connect to database")?;
    MIGRATOR.run(&pool).await.context("Failed to run migrations")?;

    let sender = ChannelSender::from_settings(&config.email, &config.sms)?;
    info!(
        email = sender.is_email_enabled(),
        sms = sender.is_sms_enabled(),
        "Delivery channels configured"
    );
    let batcher = DeliveryBatcher::new(
        Arc::new(sender),
        LinkBuilders::request_edit_link(&config.links.app_base_url),
    );

    let mut orchestrator = Orchestrator::new(
        Arc::new(PgSubscriberRepository::new(pool.clone())),
        Arc::new(PgCursorStore::new(pool.clone())),
        Arc::new(PgSentLedger::new(pool.clone())),
        batcher,
    );
    if config.enrichment.enabled {
        let enricher = HttpDescriptionEnricher::new(&http_enrichment_config())
            .context("Failed to build enrichment HTTP client")?;
        orchestrator = orchestrator.with_enrichment(Enrichment {
            enricher: Arc::new(enricher),
            concurrency: config.enrichment.concurrency,
        });
    }

    let preset = http_external_config();
    let client = build_http_client(&preset)?;
    if config.github.token.is_none() {
        warn!("No GitHub token configured, using anonymous rate limits");
    }

    let jobs: Vec<FeedJob> = FeedDescriptor::all()
        .into_iter()
        .map(|feed| {
            let api =
                GithubFeedApi::new(client.clone(), &config.github, &feed, preset.retry.clone());
            FeedJob {
                source: Arc::new(FeedPoller::new(api, feed.clone(), config.github.page_size)),
                feed,
            }
        })
        .collect();

    let runner = FeedRunner::new(
        Arc::new(orchestrator),
        RunLock::new(Arc::new(PgLeaseStore::new(pool.clone()))),
        owner_token(),
        config.lock.lease_options(),
    );
    info!(owner = %runner.owner(), feeds = jobs.len(), "Polling feeds");

    for (feed, report) in runner.run_all(&jobs).await {
        match &report {
            FeedRunReport::Completed(stats) => {
                let line = serde_json::to_string(stats).context("Failed to serialize run stats")?;
                info!(feed = %feed, result = report.as_str(), stats = %line, "Feed run stats");
            }
            FeedRunReport::Skipped => {
                info!(feed = %feed, result = report.as_str(), "Feed run skipped")
            }
            FeedRunReport::Failed(reason) => {
                error!(
                    feed = %feed,
                    result = report.as_str(),
                    reason = %reason,
                    "Feed run failed"
                )
            }
        }
    }

    pool.close().await;
    Ok(())
}
