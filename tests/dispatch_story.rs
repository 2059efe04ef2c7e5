// Dispatch story wiring against in-process backends

use anyhow::Result;
use async_trait::async_trait;
use debrid_relay::backend::Backends;
use debrid_relay::config::{Config, DebriderConfig, DownloaderConfig};
use debrid_relay::debrid::{AuthInfos, Debrider};
use debrid_relay::dispatch::story::ENTRY_STEP;
use debrid_relay::dispatch::{DispatchStory, Event, Story};
use debrid_relay::download::{Downloader, JsonMap};
use std::sync::{Arc, Mutex};

const DEBRIDABLE_URI: &str = "http://rapidgator.net/file/08987898765/HTGAWM.mkv";
const PLAIN_URI: &str = "http://google.fr/HTGAWM.mkv";
const DEBRIDED_URI: &str = "https://subdomain.alld.io/dl/ABC/HTGAWM.mkv";
const GID: &str = "96676fbc46cbbaaz";

#[derive(Default)]
struct Calls {
    /// One entry per debrider built, true when it was authenticated.
    debriders: Vec<bool>,
    submitted: Vec<String>,
}

struct StubDebrider;

#[async_trait]
impl Debrider for StubDebrider {
    async fn authenticate(&mut self, _infos: &AuthInfos) -> Result<()> {
        Ok(())
    }

    async fn debrid(&self, _uri: &str) -> Result<String> {
        Ok(DEBRIDED_URI.to_string())
    }

    fn is_debridable(&self, uri: &str) -> bool {
        uri.contains("/file/")
    }
}

struct StubDownloader {
    calls: Arc<Mutex<Calls>>,
    refuse: bool,
}

#[async_trait]
impl Downloader for StubDownloader {
    async fn authenticate(&mut self, _infos: &JsonMap) -> Result<()> {
        Ok(())
    }

    async fn download(&self, uri: &str, _options: &JsonMap) -> Result<String> {
        if self.refuse {
            anyhow::bail!("download refused");
        }
        self.calls.lock().unwrap().submitted.push(uri.to_string());
        Ok(GID.to_string())
    }

    async fn download_status(&self, _id: &str) -> Result<JsonMap> {
        Ok(JsonMap::new())
    }
}

#[derive(Default)]
struct StubBackends {
    calls: Arc<Mutex<Calls>>,
    refuse_downloads: bool,
}

#[async_trait]
impl Backends for StubBackends {
    async fn debrider(&self, _name: &str, auth: Option<&AuthInfos>) -> Result<Box<dyn Debrider>> {
        self.calls.lock().unwrap().debriders.push(auth.is_some());
        Ok(Box::new(StubDebrider))
    }

    async fn downloader(&self, _name: &str, _auth: Option<&JsonMap>) -> Result<Box<dyn Downloader>> {
        Ok(Box::new(StubDownloader {
            calls: self.calls.clone(),
            refuse: self.refuse_downloads,
        }))
    }
}

fn config() -> Config {
    let mut auth_infos = AuthInfos::new();
    auth_infos.insert("username".to_string(), "valid-username".to_string());
    auth_infos.insert("password".to_string(), "valid-password".to_string());

    Config {
        debrider: Some(DebriderConfig {
            name: "alldebrid".to_string(),
            auth_infos,
        }),
        downloader: Some(DownloaderConfig {
            name: "aria2".to_string(),
            auth_infos: JsonMap::new(),
            download_options: JsonMap::new(),
        }),
        ..Config::default()
    }
}

fn stubbed(story: DispatchStory) -> (DispatchStory, Arc<Mutex<Calls>>) {
    let backends = StubBackends::default();
    let calls = backends.calls.clone();
    (story.with_backends(Arc::new(backends)), calls)
}

async fn play(story: &DispatchStory, uri: &str) -> (Event, Option<String>) {
    let mut scenario = story.scenario();
    scenario.set_initial_step(ENTRY_STEP).unwrap();
    let mut event = Event::new("cli", uri);
    scenario.play(&mut event).await;
    (event, scenario.run_error().map(|e| e.to_string()))
}

#[tokio::test]
async fn test_nothing_enabled_does_nothing() {
    let (story, calls) = stubbed(DispatchStory::new(&config()));

    let (event, error) = play(&story, DEBRIDABLE_URI).await;

    assert_eq!(error, None);
    assert_eq!(event, Event::new("cli", DEBRIDABLE_URI));
    let calls = calls.lock().unwrap();
    assert!(calls.debriders.is_empty());
    assert!(calls.submitted.is_empty());
}

#[tokio::test]
async fn test_download_only() {
    let (story, calls) = stubbed(DispatchStory::new(&config()).enable_downloader());

    let (event, error) = play(&story, DEBRIDABLE_URI).await;

    assert_eq!(error, None);
    assert_eq!(event, Event::new("downloader", GID));
    let calls = calls.lock().unwrap();
    assert!(calls.debriders.is_empty());
    assert_eq!(calls.submitted, vec![DEBRIDABLE_URI]);
}

#[tokio::test]
async fn test_debrid_then_download() {
    let (story, calls) = stubbed(DispatchStory::new(&config()).enable_debrider().enable_downloader());

    let (event, error) = play(&story, DEBRIDABLE_URI).await;

    assert_eq!(error, None);
    assert_eq!(event, Event::new("downloader", GID));
    let calls = calls.lock().unwrap();
    // Unauthenticated host check, then the authenticated client.
    assert_eq!(calls.debriders, vec![false, true]);
    assert_eq!(calls.submitted, vec![DEBRIDED_URI]);
}

#[tokio::test]
async fn test_not_debridable_goes_straight_to_download() {
    let (story, calls) = stubbed(DispatchStory::new(&config()).enable_debrider().enable_downloader());

    let (event, error) = play(&story, PLAIN_URI).await;

    assert_eq!(error, None);
    assert_eq!(event, Event::new("downloader", GID));
    let calls = calls.lock().unwrap();
    assert_eq!(calls.debriders, vec![false]);
    assert_eq!(calls.submitted, vec![PLAIN_URI]);
}

#[tokio::test]
async fn test_debrid_only() {
    let (story, calls) = stubbed(DispatchStory::new(&config()).enable_debrider());

    let (event, error) = play(&story, DEBRIDABLE_URI).await;

    assert_eq!(error, None);
    assert_eq!(event, Event::new("debrider", DEBRIDED_URI));
    assert!(calls.lock().unwrap().submitted.is_empty());
}

#[tokio::test]
async fn test_scenario_is_replayable() {
    let (story, calls) = stubbed(DispatchStory::new(&config()).enable_debrider().enable_downloader());
    let mut scenario = story.scenario();

    let mut first = Event::new("feed-watcher", DEBRIDABLE_URI);
    scenario.set_initial_step(ENTRY_STEP).unwrap();
    scenario.play(&mut first).await;
    assert!(scenario.run_error().is_none());

    // The second walk must not see the first one's debridable flag.
    let mut second = Event::new("feed-watcher", PLAIN_URI);
    scenario.set_initial_step(ENTRY_STEP).unwrap();
    scenario.play(&mut second).await;
    assert!(scenario.run_error().is_none());

    assert_eq!(first, Event::new("downloader", GID));
    assert_eq!(second, Event::new("downloader", GID));
    assert_eq!(calls.lock().unwrap().submitted, vec![DEBRIDED_URI, PLAIN_URI]);
}

#[tokio::test]
async fn test_notifier_called_once_with_final_event() {
    let notified: Arc<Mutex<Vec<Event>>> = Arc::default();
    let sink = notified.clone();
    let (story, _calls) = stubbed(
        DispatchStory::new(&config())
            .enable_debrider()
            .enable_downloader()
            .with_notifier(move |event| {
                sink.lock().unwrap().push(event.clone());
                Ok(())
            }),
    );

    let (event, error) = play(&story, DEBRIDABLE_URI).await;

    assert_eq!(error, None);
    assert_eq!(*notified.lock().unwrap(), vec![event]);
}

#[tokio::test]
async fn test_notifier_error_fails_the_walk() {
    let (story, _calls) = stubbed(
        DispatchStory::new(&config())
            .enable_downloader()
            .with_notifier(|_| anyhow::bail!("notification failed")),
    );

    let (event, error) = play(&story, PLAIN_URI).await;

    assert_eq!(error.as_deref(), Some("notification failed"));
    assert_eq!(event, Event::new("downloader", GID));
}

#[tokio::test]
async fn test_failed_download_keeps_debrided_event() {
    let backends = StubBackends {
        refuse_downloads: true,
        ..StubBackends::default()
    };
    let story = DispatchStory::new(&config())
        .enable_debrider()
        .enable_downloader()
        .with_backends(Arc::new(backends));

    let (event, error) = play(&story, DEBRIDABLE_URI).await;

    assert_eq!(error.as_deref(), Some("download refused"));
    assert_eq!(event, Event::new("debrider", DEBRIDED_URI));
}

#[tokio::test]
async fn test_missing_debrider_config() {
    let config = Config {
        debrider: None,
        ..config()
    };
    let (story, _calls) = stubbed(DispatchStory::new(&config).enable_debrider());

    let (event, error) = play(&story, DEBRIDABLE_URI).await;

    assert_eq!(error.as_deref(), Some("no debrider configured"));
    assert_eq!(event, Event::new("cli", DEBRIDABLE_URI));
}
