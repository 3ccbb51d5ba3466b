//! Integration tests driving `SoundManager` end-to-end against in-memory
//! fetch/decode/atlas collaborators, the same shape a host embedding would
//! wire up with a real HTTP client and audio decoder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use bytes::Bytes;
use sonora_core::traits::{AtlasSource, BoxFuture, DecodedAudio, Decoder, Fetcher};
use sonora_core::{SoundEvent, SoundManager};

struct FixedAtlasSource(String);
impl AtlasSource for FixedAtlasSource {
    fn fetch_atlas(&self, _url: &str) -> BoxFuture<'_, Result<String, String>> {
        let json = self.0.clone();
        Box::pin(async move { Ok(json) })
    }
}

/// Records the full path it was asked to fetch (load_path + file_name +
/// extension), the way a real HTTP-backed fetcher would compose one.
struct RecordingFetcher {
    load_path: StdMutex<String>,
    payloads: HashMap<String, Bytes>,
    requested_paths: StdMutex<Vec<String>>,
    fetch_count: StdMutex<u32>,
}

impl RecordingFetcher {
    fn new(payloads: HashMap<String, Bytes>) -> Self {
        Self {
            load_path: StdMutex::new("./encoded/".to_string()),
            payloads,
            requested_paths: StdMutex::new(Vec::new()),
            fetch_count: StdMutex::new(0),
        }
    }
}

impl Fetcher for RecordingFetcher {
    fn fetch(&self, file_name: &str) -> BoxFuture<'_, Result<Bytes, String>> {
        let path = format!("{}{}.webm", self.load_path.lock().unwrap(), file_name);
        self.requested_paths.lock().unwrap().push(path);
        *self.fetch_count.lock().unwrap() += 1;
        let result = self
            .payloads
            .get(file_name)
            .cloned()
            .ok_or_else(|| format!("no such file: {file_name}"));
        Box::pin(async move { result })
    }

    fn set_load_path(&self, path: &str) {
        *self.load_path.lock().unwrap() = path.to_string();
    }
}

struct SilenceDecoder;
impl Decoder for SilenceDecoder {
    fn decode(&self, bytes: Bytes) -> BoxFuture<'_, Result<DecodedAudio, String>> {
        Box::pin(async move {
            Ok(DecodedAudio {
                channels: 1,
                sample_rate: 48000,
                channel_data: vec![vec![0.42; bytes.len().max(1)]],
            })
        })
    }
}

fn manager_with(
    atlas_json: &str,
    payloads: HashMap<String, Bytes>,
    default_package: &str,
) -> (SoundManager<RecordingFetcher, SilenceDecoder, FixedAtlasSource>, Arc<RecordingFetcher>) {
    let fetcher = Arc::new(RecordingFetcher::new(payloads));
    let manager = SoundManager::new(
        Arc::new(FixedAtlasSource(atlas_json.to_string())),
        fetcher.clone(),
        Arc::new(SilenceDecoder),
        48000,
        default_package,
        "_",
    );
    (manager, fetcher)
}

#[tokio::test]
async fn scenario_1_resolves_and_fetches_at_the_configured_load_path() {
    let atlas = r#"{ "a": [["hi", "24k.1ch.7.webm-basename", 48000, "_"]] }"#;
    let mut payloads = HashMap::new();
    payloads.insert("24k.1ch.7.webm-basename".to_string(), Bytes::from_static(b"x"));
    let (manager, fetcher) = manager_with(atlas, payloads, "a");

    manager.load("ignored://url").await.unwrap();
    assert_eq!(manager.current_package().await, "a");

    let buffer = manager.request_async("hi").await.unwrap();
    assert_eq!(buffer.shape(), (1, 48000, 48000));
    assert_eq!(
        fetcher.requested_paths.lock().unwrap().as_slice(),
        &["./encoded/24k.1ch.7.webm-basename.webm".to_string()]
    );
}

#[tokio::test]
async fn scenario_2_language_match_wins_over_sentinel_order() {
    let atlas = r#"{ "a": [["hi","F1",48000,"en"], ["hi","F2",48000,"_"]] }"#;
    let mut payloads = HashMap::new();
    payloads.insert("F1".to_string(), Bytes::from_static(b"en"));
    payloads.insert("F2".to_string(), Bytes::from_static(b"any"));
    let (manager, fetcher) = manager_with(atlas, payloads, "a");
    manager.load("ignored://url").await.unwrap();
    manager.set_language("en").await;

    manager.request_async("hi").await.unwrap();
    assert_eq!(fetcher.requested_paths.lock().unwrap().last().unwrap(), "./encoded/F1.webm");
}

#[tokio::test]
async fn scenario_2_sentinel_first_wins_regardless_of_language() {
    let atlas = r#"{ "a": [["hi","F2",48000,"_"], ["hi","F1",48000,"en"]] }"#;
    let mut payloads = HashMap::new();
    payloads.insert("F1".to_string(), Bytes::from_static(b"en"));
    payloads.insert("F2".to_string(), Bytes::from_static(b"any"));
    let (manager, fetcher) = manager_with(atlas, payloads, "a");
    manager.load("ignored://url").await.unwrap();
    manager.set_language("en").await;

    manager.request_async("hi").await.unwrap();
    assert_eq!(fetcher.requested_paths.lock().unwrap().last().unwrap(), "./encoded/F2.webm");
}

#[tokio::test]
async fn scenario_3_cross_package_fallback_reaches_common() {
    let atlas = r#"{ "a": [], "common": [["bell", "B", 1000, "_"]] }"#;
    let mut payloads = HashMap::new();
    payloads.insert("B".to_string(), Bytes::from_static(b"ding"));
    let (manager, fetcher) = manager_with(atlas, payloads, "a");
    manager.load("ignored://url").await.unwrap();

    let buffer = manager.request_async("bell").await.unwrap();
    assert_eq!(buffer.shape().1, 1000);
    assert_eq!(fetcher.requested_paths.lock().unwrap().last().unwrap(), "./encoded/B.webm");
}

#[tokio::test]
async fn scenario_4_sync_request_returns_placeholder_then_fills_on_sound_loaded() {
    let atlas = r#"{ "a": [["hi", "F", 48000, "_"]] }"#;
    let mut payloads = HashMap::new();
    payloads.insert("F".to_string(), Bytes::from_static(b"payload"));
    let (manager, _fetcher) = manager_with(atlas, payloads, "a");
    manager.load("ignored://url").await.unwrap();

    let loaded = Arc::new(StdMutex::new(false));
    let loaded2 = loaded.clone();
    let _sub = manager.events().add_listener(move |e| {
        if matches!(e, SoundEvent::SoundLoaded { file_name } if file_name == "F") {
            *loaded2.lock().unwrap() = true;
        }
    });

    let placeholder = manager.request_sync("hi").await.unwrap();
    assert!(placeholder.first_frame_is_silent());
    assert_eq!(placeholder.shape(), (1, 48000, 48000));

    // Drive the in-flight load to completion and let the in-place fill land.
    let filled = manager.request_async("hi").await.unwrap();
    assert!(filled.ptr_eq(&placeholder));
    assert!(!filled.first_frame_is_silent());
    assert!(*loaded.lock().unwrap());
}

#[tokio::test]
async fn scenario_5_concurrent_requests_single_flight_to_one_fetch() {
    let atlas = r#"{ "a": [["hi", "F", 48000, "_"]] }"#;
    let mut payloads = HashMap::new();
    payloads.insert("F".to_string(), Bytes::from_static(b"payload"));
    let (manager, fetcher) = manager_with(atlas, payloads, "a");
    manager.load("ignored://url").await.unwrap();

    let manager = Arc::new(manager);
    let a = manager.clone();
    let b = manager.clone();
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { a.request_async("hi").await }),
        tokio::spawn(async move { b.request_async("hi").await }),
    );

    let buf1 = r1.unwrap().unwrap();
    let buf2 = r2.unwrap().unwrap();
    assert!(buf1.ptr_eq(&buf2));
    assert_eq!(*fetcher.fetch_count.lock().unwrap(), 1);
}
