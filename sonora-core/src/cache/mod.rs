//! # Buffer Cache
//!
//! Per-file promise+buffer cache with single-flight decode, in-place
//! placeholder fill, and error isolation. This implementation targets
//! native hosts (it drives its background decodes with
//! `tokio::spawn`); the `wasm` feature's facade (see [`crate::wasm`])
//! reimplements the same single-flight/placeholder shape against the
//! browser's `fetch`/`decodeAudioData`, reimplementing concurrency plumbing
//! per-platform rather than forcing one executor onto both targets.

mod buffer;

pub use buffer::{AudioBufferData, Buffer};

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::future::{FutureExt, Shared};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::content_address::ContentAddress;
use crate::error::CacheError;
use crate::events::{EventBus, SoundEvent};
use crate::traits::{Decoder, Fetcher};

type Ticket = Shared<Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send>>>;

/// One file the cache knows how to resolve, as handed to it by
/// `SoundManager` after resolution — the cache itself never resolves a
/// `source_name`, it only ever deals in `file_name`s.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub file_name: String,
    pub sample_count: u64,
}

/// `BufferCache` spawns cleanup/decode tasks onto the runtime, which
/// requires a `'static` handle to itself — so the methods that spawn take
/// `self: &Arc<Self>` rather than plain `&self`. Hosts are expected to hold
/// their `BufferCache` behind an `Arc` regardless (`SoundManager` does),
/// since single-flighting only means anything if every caller shares one
/// cache instance.
pub struct BufferCache<F: Fetcher, D: Decoder> {
    fetcher: Arc<F>,
    decoder: Arc<D>,
    sample_rate: u32,
    pending: AsyncMutex<HashMap<String, Ticket>>,
    buffers: AsyncMutex<HashMap<String, Buffer>>,
    priorities: AsyncMutex<Vec<String>>,
    events: EventBus,
}

impl<F: Fetcher, D: Decoder> BufferCache<F, D> {
    pub fn new(fetcher: Arc<F>, decoder: Arc<D>, sample_rate: u32, events: EventBus) -> Self {
        Self {
            fetcher,
            decoder,
            sample_rate,
            pending: AsyncMutex::new(HashMap::new()),
            buffers: AsyncMutex::new(HashMap::new()),
            priorities: AsyncMutex::new(Vec::new()),
            events,
        }
    }

    pub fn set_load_path(&self, path: &str) {
        self.fetcher.set_load_path(path);
    }

    /// Configure priority source names. Bulk loads reorder so these come
    /// first, stable otherwise.
    pub async fn set_priorities(&self, priority_file_names: Vec<String>) {
        *self.priorities.lock().await = priority_file_names;
    }

    async fn priority_rank(&self, file_name: &str) -> usize {
        let priorities = self.priorities.lock().await;
        priorities
            .iter()
            .position(|p| p == file_name)
            .unwrap_or(priorities.len())
    }

    /// Reorder `files` so priority entries come first, stable-sorted,
    /// non-priority entries keeping their relative order after them.
    pub async fn order_by_priority(&self, files: Vec<ResolvedFile>) -> Vec<ResolvedFile> {
        let mut ranked: Vec<(usize, ResolvedFile)> = Vec::with_capacity(files.len());
        for file in files {
            let rank = self.priority_rank(&file.file_name).await;
            ranked.push((rank, file));
        }
        ranked.sort_by_key(|(rank, _)| *rank);
        ranked.into_iter().map(|(_, f)| f).collect()
    }

    /// Fetches and decodes `file` (already resolved by the caller),
    /// single-flighting concurrent requests for the same `file_name`.
    /// Resolves to `None` on fetch/decode error, after emitting
    /// `SoundLoadError`.
    pub async fn request_async(self: &Arc<Self>, file: &ResolvedFile) -> Option<Buffer> {
        if let Some(buf) = self.buffers.lock().await.get(&file.file_name).cloned() {
            return Some(buf);
        }

        let ticket = self.install_or_join_ticket(file).await;
        let _ = ticket.await;
        self.buffers.lock().await.get(&file.file_name).cloned()
    }

    /// Returns a decoded buffer immediately if cached, otherwise allocates
    /// and inserts a silent placeholder of the correct shape, kicks off the
    /// load in the background, and returns the placeholder. Returns `None`
    /// only if `file_name` cannot even be parsed for its channel count.
    pub async fn request_sync(self: &Arc<Self>, file: &ResolvedFile) -> Option<Buffer> {
        if let Some(buf) = self.buffers.lock().await.get(&file.file_name).cloned() {
            return Some(buf);
        }

        let channels = match ContentAddress::channels_from_file_name(&file.file_name) {
            Ok(c) => c,
            Err(e) => {
                warn!(file_name = %file.file_name, error = %e, "cannot size placeholder");
                return None;
            }
        };

        let placeholder = Buffer::placeholder(channels, file.sample_count as usize, self.sample_rate);
        self.buffers
            .lock()
            .await
            .insert(file.file_name.clone(), placeholder.clone());

        // Kick off the background load; request_sync returns before any
        // resulting SoundLoaded event fires.
        let ticket = self.install_or_join_ticket(file).await;
        tokio::spawn(async move {
            let _ = ticket.await;
        });

        Some(placeholder)
    }

    pub async fn load_file(self: &Arc<Self>, file: &ResolvedFile) {
        let _ = self.request_async(file).await;
    }

    pub async fn load_items(self: &Arc<Self>, files: Vec<ResolvedFile>) {
        let ordered = self.order_by_priority(files).await;
        for file in ordered {
            let _ = self.request_async(&file).await;
        }
    }

    /// Remove a cached entry, awaiting its in-flight ticket first (if any)
    /// so the decode's completion callback cannot resurrect a disposed
    /// entry.
    pub async fn dispose_entry(&self, file_name: &str) {
        let ticket = self.pending.lock().await.remove(file_name);
        self.buffers.lock().await.remove(file_name);
        if let Some(ticket) = ticket {
            let _ = ticket.await;
            // The completion handler never looks at `pending` — it
            // unconditionally writes a buffer under `file_name` once the
            // fetch/decode resolves. Awaiting the ticket above just
            // guarantees that write has already happened, so this second
            // removal is the one actually doing the eviction; dropping it
            // would let a completion racing with this call resurrect the
            // entry right after disposal.
            self.buffers.lock().await.remove(file_name);
        }
    }

    pub async fn dispose_all(&self) {
        let file_names: Vec<String> = self.buffers.lock().await.keys().cloned().collect();
        for file_name in file_names {
            self.dispose_entry(&file_name).await;
        }
        self.pending.lock().await.clear();
        self.buffers.lock().await.clear();
    }

    pub async fn is_empty(&self) -> bool {
        self.buffers.lock().await.is_empty() && self.pending.lock().await.is_empty()
    }

    /// Install a decode ticket for `file`, or join the one already running.
    /// The future driving the decode holds its own `Arc<Self>` clone so it
    /// can be spawned onto the runtime and outlive this call.
    async fn install_or_join_ticket(self: &Arc<Self>, file: &ResolvedFile) -> Ticket {
        let mut pending = self.pending.lock().await;
        if let Some(existing) = pending.get(&file.file_name) {
            return existing.clone();
        }

        let this = self.clone();
        let file_name = file.file_name.clone();
        let sample_count = file.sample_count;

        let fut: Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send>> = Box::pin(async move {
            let result = async {
                let bytes = this.fetcher.fetch(&file_name).await.map_err(|message| CacheError::Fetch {
                    file_name: file_name.clone(),
                    message,
                })?;
                let decoded = this.decoder.decode(bytes).await.map_err(|message| CacheError::Decode {
                    file_name: file_name.clone(),
                    message,
                })?;
                Ok::<_, CacheError>(decoded)
            }
            .await;

            match result {
                Ok(decoded) => {
                    let mut buffers = this.buffers.lock().await;
                    match buffers.get(&file_name) {
                        Some(placeholder) => placeholder.fill_in_place(&decoded),
                        None => {
                            let fresh = Buffer::from_decoded(&decoded, sample_count as usize);
                            buffers.insert(file_name.clone(), fresh);
                        }
                    }
                    drop(buffers);
                    debug!(file_name = %file_name, "sound loaded");
                    this.events.emit(SoundEvent::SoundLoaded {
                        file_name: file_name.clone(),
                    });
                    Ok(())
                }
                Err(e) => {
                    warn!(file_name = %file_name, error = %e, "sound load failed");
                    this.events.emit(SoundEvent::SoundLoadError {
                        file_name: file_name.clone(),
                    });
                    Err(e)
                }
            }
        });

        let shared = fut.shared();
        pending.insert(file.file_name.clone(), shared.clone());
        drop(pending);

        let cleanup_this = self.clone();
        let cleanup_file_name = file.file_name.clone();
        let cleanup_ticket = shared.clone();
        tokio::spawn(async move {
            let _ = cleanup_ticket.await;
            cleanup_this.pending.lock().await.remove(&cleanup_file_name);
        });

        shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{BoxFuture, DecodedAudio};
    use bytes::Bytes;
    use std::sync::Mutex as StdMutex;

    struct FlakyFetcher {
        payload: Bytes,
        calls: StdMutex<u32>,
    }

    impl Fetcher for FlakyFetcher {
        fn fetch(&self, _file_name: &str) -> BoxFuture<'_, Result<Bytes, String>> {
            *self.calls.lock().unwrap() += 1;
            let payload = self.payload.clone();
            Box::pin(async move { Ok(payload) })
        }
    }

    struct CountingDecoder {
        decodes: StdMutex<u32>,
    }

    impl Decoder for CountingDecoder {
        fn decode(&self, bytes: Bytes) -> BoxFuture<'_, Result<DecodedAudio, String>> {
            *self.decodes.lock().unwrap() += 1;
            Box::pin(async move {
                Ok(DecodedAudio {
                    channels: 1,
                    sample_rate: 48000,
                    channel_data: vec![vec![1.0; bytes.len()]],
                })
            })
        }
    }

    fn test_cache() -> (Arc<BufferCache<FlakyFetcher, CountingDecoder>>, Arc<FlakyFetcher>, Arc<CountingDecoder>) {
        let fetcher = Arc::new(FlakyFetcher {
            payload: Bytes::from_static(b"abcd"),
            calls: StdMutex::new(0),
        });
        let decoder = Arc::new(CountingDecoder {
            decodes: StdMutex::new(0),
        });
        let cache = Arc::new(BufferCache::new(fetcher.clone(), decoder.clone(), 48000, EventBus::new()));
        (cache, fetcher, decoder)
    }

    #[tokio::test]
    async fn request_async_fetches_and_decodes_once_per_file() {
        let (cache, fetcher, decoder) = test_cache();
        let file = ResolvedFile {
            file_name: "64k.1ch.1".to_string(),
            sample_count: 4,
        };

        let buf = cache.request_async(&file).await.unwrap();
        assert_eq!(buf.shape(), (1, 4, 48000));
        assert_eq!(*fetcher.calls.lock().unwrap(), 1);
        assert_eq!(*decoder.decodes.lock().unwrap(), 1);

        // second request hits the cached buffer, not the fetcher again.
        let _ = cache.request_async(&file).await.unwrap();
        assert_eq!(*fetcher.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn request_sync_returns_placeholder_then_fills_in_place() {
        let (cache, _fetcher, _decoder) = test_cache();
        let file = ResolvedFile {
            file_name: "64k.1ch.1".to_string(),
            sample_count: 4,
        };

        let placeholder = cache.request_sync(&file).await.unwrap();
        assert!(placeholder.first_frame_is_silent());

        let resolved = cache.request_async(&file).await.unwrap();
        assert!(resolved.ptr_eq(&placeholder));
        assert!(!resolved.first_frame_is_silent());
    }

    #[tokio::test]
    async fn concurrent_requests_single_flight_to_one_fetch() {
        let (cache, fetcher, _decoder) = test_cache();
        let file = ResolvedFile {
            file_name: "64k.1ch.1".to_string(),
            sample_count: 4,
        };

        let a = cache.clone();
        let b = cache.clone();
        let file_a = file.clone();
        let file_b = file.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { a.request_async(&file_a).await }),
            tokio::spawn(async move { b.request_async(&file_b).await }),
        );

        assert!(r1.unwrap().unwrap().ptr_eq(&r2.unwrap().unwrap()));
        assert_eq!(*fetcher.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn dispose_entry_empties_the_cache() {
        let (cache, _fetcher, _decoder) = test_cache();
        let file = ResolvedFile {
            file_name: "64k.1ch.1".to_string(),
            sample_count: 4,
        };
        let _ = cache.request_async(&file).await;
        assert!(!cache.is_empty().await);

        cache.dispose_entry(&file.file_name).await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn order_by_priority_moves_priority_files_first() {
        let (cache, _fetcher, _decoder) = test_cache();
        cache.set_priorities(vec!["b".to_string()]).await;

        let ordered = cache
            .order_by_priority(vec![
                ResolvedFile { file_name: "a".to_string(), sample_count: 1 },
                ResolvedFile { file_name: "b".to_string(), sample_count: 1 },
                ResolvedFile { file_name: "c".to_string(), sample_count: 1 },
            ])
            .await;

        let names: Vec<_> = ordered.into_iter().map(|f| f.file_name).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }
}
