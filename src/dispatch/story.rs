use super::event::Event;
use super::scenario::Scenario;
use super::step::Action;
use crate::backend::{Backends, HttpBackends};
use crate::config::{Config, DebriderConfig, DownloaderConfig};
use crate::debrid::Debrider;
use crate::download::Downloader;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub const CONFIG_STEP: &str = "config";
pub const DEBRIDABLE_STEP: &str = "debridable";
pub const DEBRIDER_STEP: &str = "debrider";
pub const DEBRIDED_STEP: &str = "debrided";
pub const DOWNLOADER_STEP: &str = "downloader";
pub const DOWNLOADING_STEP: &str = "downloading";
pub const NOTIFIED_STEP: &str = "notified";
pub const DO_NOTHING_STEP: &str = "do-nothing";

/// Where every walk of a [`DispatchStory`] scenario starts.
pub const ENTRY_STEP: &str = CONFIG_STEP;

/// Origin tag set on an event once debrided.
pub const DEBRIDER_ORIGIN: &str = "debrider";
/// Origin tag set on an event once submitted; its value is then the job id.
pub const DOWNLOADER_ORIGIN: &str = "downloader";

/// Called with the final event when a download has been submitted.
pub type Notifier = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

/// Builds a wired [`Scenario`].
pub trait Story {
    type Context: Send + 'static;

    fn scenario(&self) -> Scenario<Self::Context>;
}

/// State shared by the steps of one [`DispatchStory`] walk.
#[derive(Default)]
pub struct DispatchContext {
    pub debrider_config: Option<DebriderConfig>,
    pub downloader_config: Option<DownloaderConfig>,
    pub debridable: bool,
    pub debrider: Option<Box<dyn Debrider>>,
    pub downloader: Option<Box<dyn Downloader>>,
}

/// Debrid then download a URI, either stage being optional.
///
/// ```text
/// config -> debridable -> debrider -> debrided -> downloader -> downloading -> notified
///        \-> downloader (debrider disabled)
///        \-> do-nothing (both disabled)
/// ```
///
/// `debrider` and `debrided` are skipped when the URI is not debridable.
pub struct DispatchStory {
    config: Config,
    with_debrider: bool,
    with_downloader: bool,
    notifier: Option<Notifier>,
    backends: Arc<dyn Backends>,
}

impl DispatchStory {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            with_debrider: false,
            with_downloader: false,
            notifier: None,
            backends: Arc::new(HttpBackends),
        }
    }

    pub fn enable_debrider(mut self) -> Self {
        self.with_debrider = true;
        self
    }

    pub fn enable_downloader(mut self) -> Self {
        self.with_downloader = true;
        self
    }

    pub fn with_notifier<F>(mut self, notifier: F) -> Self
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    pub fn with_backends(mut self, backends: Arc<dyn Backends>) -> Self {
        self.backends = backends;
        self
    }
}

impl Story for DispatchStory {
    type Context = DispatchContext;

    fn scenario(&self) -> Scenario<DispatchContext> {
        let mut scenario = Scenario::new(DispatchContext::default());

        let mut after_config = DO_NOTHING_STEP;
        // Empty means the walk stops once debrided.
        let mut after_debrid = "";

        if self.with_downloader {
            tracing::debug!("enabling downloader");
            after_config = DOWNLOADER_STEP;
            after_debrid = DOWNLOADER_STEP;
        }
        if self.with_debrider {
            tracing::debug!("enabling debrider");
            after_config = DEBRIDABLE_STEP;
        }

        let debrider_config = self.config.debrider.clone();
        let downloader_config = self.config.downloader.clone();
        scenario.step(CONFIG_STEP).to(after_config).run_fn(move |_, ctx| {
            tracing::debug!("loading config");
            *ctx = DispatchContext {
                debrider_config: debrider_config.clone(),
                downloader_config: downloader_config.clone(),
                ..DispatchContext::default()
            };
            Ok(())
        });

        scenario
            .step(DEBRIDABLE_STEP)
            .to(DEBRIDER_STEP)
            .action(CheckDebridable { backends: self.backends.clone() });

        scenario
            .step(DEBRIDER_STEP)
            .to(DEBRIDED_STEP)
            .action(AcquireDebrider { backends: self.backends.clone() })
            .when(|ctx: &DispatchContext| ctx.debridable);

        scenario
            .step(DEBRIDED_STEP)
            .to(after_debrid)
            .action(Debrid)
            .when(|ctx: &DispatchContext| ctx.debridable);

        scenario
            .step(DOWNLOADER_STEP)
            .to(DOWNLOADING_STEP)
            .action(AcquireDownloader { backends: self.backends.clone() });

        scenario
            .step(DOWNLOADING_STEP)
            .to(NOTIFIED_STEP)
            .action(Download);

        // Without a notifier `notified` stays unregistered and the walk ends
        // after the download is submitted.
        if let Some(notifier) = &self.notifier {
            let notifier = notifier.clone();
            scenario.step(NOTIFIED_STEP).run_fn(move |event, _| notifier(&*event));
        }

        scenario.step(DO_NOTHING_STEP).run_fn(|_, _| Ok(()));

        scenario
    }
}

fn debrider_config(ctx: &DispatchContext) -> Result<&DebriderConfig> {
    ctx.debrider_config
        .as_ref()
        .context("no debrider configured")
        .inspect_err(|e| tracing::error!(error = %e, "debrider unavailable"))
}

fn downloader_config(ctx: &DispatchContext) -> Result<&DownloaderConfig> {
    ctx.downloader_config
        .as_ref()
        .context("no downloader configured")
        .inspect_err(|e| tracing::error!(error = %e, "downloader unavailable"))
}

/// Probes the URI with an unauthenticated client.
struct CheckDebridable {
    backends: Arc<dyn Backends>,
}

#[async_trait]
impl Action<DispatchContext> for CheckDebridable {
    async fn run(&self, event: &mut Event, ctx: &mut DispatchContext) -> Result<()> {
        let config = debrider_config(ctx)?;
        let checker = self
            .backends
            .debrider(&config.name, None)
            .await
            .inspect_err(|e| tracing::error!(handler = %config.name, error = %e, "failed to create debrider"))?;

        let debridable = checker.is_debridable(&event.value);
        if debridable {
            tracing::info!(handler = %config.name, uri = %event.value, "URI is debridable");
        }
        ctx.debridable = debridable;
        Ok(())
    }
}

struct AcquireDebrider {
    backends: Arc<dyn Backends>,
}

#[async_trait]
impl Action<DispatchContext> for AcquireDebrider {
    async fn run(&self, _event: &mut Event, ctx: &mut DispatchContext) -> Result<()> {
        let config = debrider_config(ctx)?;
        let debrider = self
            .backends
            .debrider(&config.name, Some(&config.auth_infos))
            .await
            .inspect_err(|e| tracing::error!(handler = %config.name, error = %e, "debrider authentication failed"))?;
        ctx.debrider = Some(debrider);
        Ok(())
    }
}

struct Debrid;

#[async_trait]
impl Action<DispatchContext> for Debrid {
    async fn run(&self, event: &mut Event, ctx: &mut DispatchContext) -> Result<()> {
        let debrider = ctx.debrider.as_ref().context("debrider was not acquired")?;
        let debrided = debrider
            .debrid(&event.value)
            .await
            .inspect_err(|e| tracing::error!(uri = %event.value, error = %e, "debrid failed"))?;

        tracing::debug!(initial = %event.value, debrided = %debrided, "URI is debrided");
        event.origin = DEBRIDER_ORIGIN.to_string();
        event.value = debrided;
        Ok(())
    }
}

struct AcquireDownloader {
    backends: Arc<dyn Backends>,
}

#[async_trait]
impl Action<DispatchContext> for AcquireDownloader {
    async fn run(&self, _event: &mut Event, ctx: &mut DispatchContext) -> Result<()> {
        let config = downloader_config(ctx)?;
        let downloader = self
            .backends
            .downloader(&config.name, Some(&config.auth_infos))
            .await
            .inspect_err(|e| tracing::error!(handler = %config.name, error = %e, "downloader authentication failed"))?;
        ctx.downloader = Some(downloader);
        Ok(())
    }
}

struct Download;

#[async_trait]
impl Action<DispatchContext> for Download {
    async fn run(&self, event: &mut Event, ctx: &mut DispatchContext) -> Result<()> {
        let config = downloader_config(ctx)?;
        let downloader = ctx.downloader.as_ref().context("downloader was not acquired")?;
        let id = downloader
            .download(&event.value, &config.download_options)
            .await
            .inspect_err(|e| tracing::error!(uri = %event.value, error = %e, "download failed"))?;

        tracing::info!(handler = %config.name, id = %id, uri = %event.value, "download started");
        event.origin = DOWNLOADER_ORIGIN.to_string();
        event.value = id;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(story: &DispatchStory) -> Vec<String> {
        story.scenario().step_names().into_iter().map(String::from).collect()
    }

    #[test]
    fn test_notified_step_registered_only_with_notifier() {
        let config = Config::default();
        let plain = DispatchStory::new(&config).enable_downloader();
        assert!(!names(&plain).iter().any(|n| n == NOTIFIED_STEP));

        let notified = DispatchStory::new(&config)
            .enable_downloader()
            .with_notifier(|_| Ok(()));
        assert!(names(&notified).iter().any(|n| n == NOTIFIED_STEP));
    }

    #[test]
    fn test_config_successor_follows_enabled_stages() {
        let config = Config::default();
        let successor = |story: DispatchStory| {
            let mut scenario = story.scenario();
            scenario.set_initial_step(ENTRY_STEP).unwrap();
            scenario.current_step().and_then(|s| s.next()).map(String::from)
        };

        assert_eq!(successor(DispatchStory::new(&config)).as_deref(), Some(DO_NOTHING_STEP));
        assert_eq!(
            successor(DispatchStory::new(&config).enable_downloader()).as_deref(),
            Some(DOWNLOADER_STEP)
        );
        assert_eq!(
            successor(DispatchStory::new(&config).enable_downloader().enable_debrider()).as_deref(),
            Some(DEBRIDABLE_STEP)
        );
    }
}
