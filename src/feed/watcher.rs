use super::parser::HttpFeedParser;
use super::types::RemoteFeed;
use super::FeedParser;
use crate::dispatch::story::{DispatchContext, ENTRY_STEP};
use crate::dispatch::{Event, Scenario};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

/// Origin tag of the events a watcher dispatches.
pub const FEED_WATCHER_ORIGIN: &str = "feed-watcher";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WatcherError {
    #[error("invalid interval")]
    InvalidInterval,

    #[error("no feeds in config")]
    NoFeeds,

    #[error("invalid since date")]
    InvalidSince,
}

/// Feeds that failed during one tick, as `"<title>: <error>"` lines.
#[derive(Debug, Error)]
#[error("{}", .0.join("\n"))]
pub struct FeedErrors(pub Vec<String>);

enum FeedOutcome {
    Links(Vec<String>),
    Failed { title: String, error: anyhow::Error },
}

/// Polls feeds on a fixed interval and replays a scenario for every new link.
pub struct FeedWatcher<C = DispatchContext> {
    interval: Duration,
    feeds: Vec<RemoteFeed>,
    parser: Arc<dyn FeedParser>,
    since: Option<DateTime<Utc>>,
    scenario: Option<Scenario<C>>,
    entry_step: String,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<C: Send + 'static> FeedWatcher<C> {
    pub fn new(interval: Duration) -> Result<Self, WatcherError> {
        if interval.is_zero() {
            return Err(WatcherError::InvalidInterval);
        }
        Ok(Self {
            interval,
            feeds: Vec::new(),
            parser: Arc::new(HttpFeedParser::new()),
            since: None,
            scenario: None,
            entry_step: ENTRY_STEP.to_string(),
            shutdown: None,
        })
    }

    pub fn with_feeds(mut self, feeds: Vec<RemoteFeed>) -> Self {
        self.feeds = feeds;
        self
    }

    pub fn with_parser(mut self, parser: impl FeedParser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    /// Only items published after this date are picked up on the first tick.
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_scenario(mut self, scenario: Scenario<C>) -> Self {
        self.scenario = Some(scenario);
        self
    }

    pub fn with_entry_step(mut self, step: impl Into<String>) -> Self {
        self.entry_step = step.into();
        self
    }

    /// Stop between ticks once the value turns true, or the sender is dropped.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn since(&self) -> Option<DateTime<Utc>> {
        self.since
    }

    pub fn scenario(&self) -> Option<&Scenario<C>> {
        self.scenario.as_ref()
    }

    /// Fetch every feed concurrently and gather the links newer than `since`.
    ///
    /// Links come back in completion order. Failed feeds do not prevent the
    /// links of the others from being returned.
    pub async fn new_links(&self, since: DateTime<Utc>) -> (Vec<String>, Option<FeedErrors>) {
        let (tx, mut rx) = mpsc::channel(self.feeds.len().max(1));

        for feed in &self.feeds {
            let tx = tx.clone();
            let feed = feed.clone();
            let parser = self.parser.clone();
            tokio::spawn(async move {
                let outcome = match feed.new_links(since, parser.as_ref()).await {
                    Ok(links) => FeedOutcome::Links(links),
                    Err(error) => FeedOutcome::Failed { title: feed.title.clone(), error },
                };
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut links = Vec::new();
        let mut errors = Vec::new();
        for _ in 0..self.feeds.len() {
            match rx.recv().await {
                Some(FeedOutcome::Links(found)) => links.extend(found),
                Some(FeedOutcome::Failed { title, error }) => {
                    tracing::warn!(feed = %title, error = %error, "feed failed");
                    errors.push(format!("{}: {:#}", title, error));
                }
                None => {
                    errors.push("feed task ended without reporting".to_string());
                    break;
                }
            }
        }

        let errors = (!errors.is_empty()).then_some(FeedErrors(errors));
        (links, errors)
    }

    /// Replay the scenario once per link, one walk at a time.
    pub async fn process_new_links(&mut self, links: &[String]) {
        let Some(scenario) = self.scenario.as_mut() else {
            for link in links {
                tracing::info!(uri = %link, "new link (no scenario to dispatch it)");
            }
            return;
        };

        for link in links {
            if let Err(err) = scenario.set_initial_step(&self.entry_step) {
                tracing::error!(step = %self.entry_step, error = %err, "cannot dispatch new links");
                return;
            }

            let mut event = Event::new(FEED_WATCHER_ORIGIN, link.clone());
            scenario.play(&mut event).await;
            match scenario.run_error() {
                Some(err) => tracing::error!(uri = %link, error = %err, "dispatch failed"),
                None => tracing::debug!(uri = %link, result = %event.value, "link dispatched"),
            }
        }
    }

    /// Tick until `max_run_count` ticks are done (0 means forever) or the
    /// shutdown signal fires, and return a summary.
    ///
    /// The first tick happens one interval after the call. A tick that runs
    /// over the interval makes the watcher skip the ticks it missed.
    pub async fn run(&mut self, max_run_count: u64) -> Result<String, WatcherError> {
        if self.feeds.is_empty() {
            return Err(WatcherError::NoFeeds);
        }
        let mut since = match self.since {
            Some(since) if since.timestamp() != 0 => since,
            _ => return Err(WatcherError::InvalidSince),
        };

        tracing::info!(
            feeds = self.feeds.len(),
            interval_secs = self.interval.as_secs(),
            since = %since,
            "feed watcher started"
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut runs: u64 = 0;
        let mut total: usize = 0;

        loop {
            match self.shutdown.as_mut() {
                Some(shutdown) => {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = shutdown.wait_for(|stop| *stop) => {
                            tracing::info!(runs, "feed watcher shutting down");
                            break;
                        }
                    }
                }
                None => {
                    ticker.tick().await;
                }
            }

            let (links, errors) = self.new_links(since).await;
            if let Some(errors) = errors {
                tracing::warn!(failed = errors.0.len(), errors = %errors, "some feeds could not be read");
            }

            total += links.len();
            self.process_new_links(&links).await;

            since = Utc::now();
            self.since = Some(since);
            runs += 1;
            tracing::info!(run = runs, items = links.len(), "feed watcher tick done");

            if max_run_count > 0 && runs >= max_run_count {
                break;
            }
        }

        Ok(format!("{} runs done, {} items found", runs, total))
    }
}
