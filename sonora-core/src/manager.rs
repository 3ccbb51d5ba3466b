//! # Sound Manager
//!
//! The single public facade a host application embeds: owns the atlas, the
//! current package/language selection, and the buffer cache, and gates
//! every operation through the lifecycle state machine.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::atlas::Atlas;
use crate::cache::{Buffer, BufferCache, ResolvedFile};
use crate::error::{Result, SonoraError};
use crate::events::{EventBus, SoundEvent};
use crate::lifecycle::SoundManagerState;
use crate::resolver::resolve_item;
use crate::traits::{AtlasSource, Decoder, Fetcher};

/// Sound manager: atlas ownership, selection state, and the single entry
/// point a host uses to request playback buffers.
pub struct SoundManager<F: Fetcher, D: Decoder, A: AtlasSource> {
    atlas: RwLock<Atlas>,
    atlas_source: Arc<A>,
    cache: Arc<BufferCache<F, D>>,
    package: Mutex<String>,
    language: Mutex<String>,
    state: RwLock<SoundManagerState>,
    events: EventBus,
}

impl<F: Fetcher, D: Decoder, A: AtlasSource> SoundManager<F, D, A> {
    pub fn new(
        atlas_source: Arc<A>,
        fetcher: Arc<F>,
        decoder: Arc<D>,
        sample_rate: u32,
        default_package: impl Into<String>,
        default_language: impl Into<String>,
    ) -> Self {
        let events = EventBus::new();
        Self {
            atlas: RwLock::new(Atlas::new()),
            atlas_source,
            cache: Arc::new(BufferCache::new(fetcher, decoder, sample_rate, events.clone())),
            package: Mutex::new(default_package.into()),
            language: Mutex::new(default_language.into()),
            state: RwLock::new(SoundManagerState::Running),
            events,
        }
    }

    /// Subscribe to manager events. See [`SoundEvent`] for the closed set
    /// of observations.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn state(&self) -> SoundManagerState {
        *self.state.read().await
    }

    /// Fetch and install the atlas document at `url`, emitting
    /// `AtlasLoaded` on success.
    pub async fn load(&self, url: &str) -> Result<()> {
        let json = self
            .atlas_source
            .fetch_atlas(url)
            .await
            .map_err(SonoraError::AtlasFetch)?;
        let parsed = Atlas::parse(&json)?;
        self.install_atlas(parsed).await;
        Ok(())
    }

    /// Replace the in-memory atlas directly, emitting `AtlasLoaded`. Does
    /// NOT invalidate the buffer cache — a file already resolved under its
    /// old `file_name` keeps playing from the old buffer until the caller
    /// explicitly reloads.
    pub async fn replace(&self, atlas: Atlas) {
        self.install_atlas(atlas).await;
    }

    async fn install_atlas(&self, atlas: Atlas) {
        *self.atlas.write().await = atlas;
        info!("atlas loaded");
        self.events.emit(SoundEvent::AtlasLoaded);
    }

    /// Switch the current package. Returns `false` (no-op) if `name`
    /// equals the current package, is unknown in the atlas, or the
    /// manager isn't `Running`.
    pub async fn set_package(&self, name: &str) -> bool {
        if !self.state().await.allows_mutation() {
            return false;
        }
        {
            let current = self.package.lock().await;
            if *current == name {
                return false;
            }
        }
        if !self.atlas.read().await.contains_package(name) {
            return false;
        }
        *self.package.lock().await = name.to_string();
        self.events.emit(SoundEvent::PackageChanged);
        true
    }

    /// Switch the current language. Returns `false` if `tag` equals the
    /// current language, isn't among `languages(current_package)`, or the
    /// manager isn't `Running`.
    pub async fn set_language(&self, tag: &str) -> bool {
        if !self.state().await.allows_mutation() {
            return false;
        }
        {
            let current = self.language.lock().await;
            if *current == tag {
                return false;
            }
        }
        let package = self.package.lock().await.clone();
        if !self.atlas.read().await.languages(&package).iter().any(|l| l == tag) {
            return false;
        }
        *self.language.lock().await = tag.to_string();
        self.events.emit(SoundEvent::LanguageChanged);
        true
    }

    pub async fn set_load_path(&self, path: &str) {
        if !self.state().await.allows_mutation() {
            return;
        }
        self.cache.set_load_path(path);
        self.events.emit(SoundEvent::LoadPathChanged);
    }

    pub async fn current_package(&self) -> String {
        self.package.lock().await.clone()
    }

    pub async fn current_language(&self) -> String {
        self.language.lock().await.clone()
    }

    /// Every package name in the atlas, in atlas insertion order (callers
    /// sort if they need a particular display order). Empty while
    /// `Closing` or `Disposed`.
    pub async fn package_names(&self) -> Vec<String> {
        if !self.state().await.allows_query() {
            return Vec::new();
        }
        self.atlas.read().await.package_names().map(str::to_string).collect()
    }

    /// Source names of items in `package` (defaults to the current
    /// package) whose `language_tag` is in `languages` (defaults to just
    /// the current language). The `"_"` sentinel is never added
    /// automatically — pass it explicitly to include unlocalized items.
    pub async fn source_names(&self, package: Option<&str>, languages: Option<&[String]>) -> Vec<String> {
        if !self.state().await.allows_query() {
            return Vec::new();
        }
        let package = match package {
            Some(p) => p.to_string(),
            None => self.current_package().await,
        };
        let languages: Vec<String> = match languages {
            Some(l) => l.to_vec(),
            None => vec![self.current_language().await],
        };
        let atlas = self.atlas.read().await;
        match atlas.package(&package) {
            Some(items) => items
                .iter()
                .filter(|item| languages.iter().any(|l| l == &item.language_tag))
                .map(|item| item.source_name.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub async fn languages(&self, package: Option<&str>) -> Vec<String> {
        if !self.state().await.allows_query() {
            return Vec::new();
        }
        let package = match package {
            Some(p) => p.to_string(),
            None => self.current_package().await,
        };
        self.atlas.read().await.languages(&package)
    }

    async fn resolve_current(&self, source_name: &str) -> Option<ResolvedFile> {
        let package = self.current_package().await;
        let language = self.current_language().await;
        let atlas = self.atlas.read().await;
        resolve_item(&atlas, source_name, &package, &language).map(|item| ResolvedFile {
            file_name: item.file_name.clone(),
            sample_count: item.sample_count,
        })
    }

    pub async fn request_async(&self, source_name: &str) -> Option<Buffer> {
        if !self.state().await.allows_mutation() {
            return None;
        }
        let file = self.resolve_current(source_name).await?;
        self.cache.request_async(&file).await
    }

    pub async fn request_sync(&self, source_name: &str) -> Option<Buffer> {
        if !self.state().await.allows_mutation() {
            return None;
        }
        let file = self.resolve_current(source_name).await?;
        self.cache.request_sync(&file).await
    }

    pub async fn load_file(&self, source_name: &str) {
        if !self.state().await.allows_mutation() {
            return;
        }
        if let Some(file) = self.resolve_current(source_name).await {
            self.cache.load_file(&file).await;
        }
    }

    pub async fn load_package(&self, name: &str) {
        if !self.state().await.allows_mutation() {
            return;
        }
        let languages = vec![self.current_language().await];
        let source_names = self.source_names(Some(name), Some(&languages)).await;
        self.load_many(name, &source_names).await;
    }

    pub async fn load_language(&self, language: &str, packages: &[String]) {
        if !self.state().await.allows_mutation() {
            return;
        }
        let languages = vec![language.to_string()];
        for package in packages {
            let names = self.source_names(Some(package), Some(&languages)).await;
            self.load_many(package, &names).await;
        }
    }

    async fn load_many(&self, package: &str, source_names: &[String]) {
        let atlas = self.atlas.read().await;
        let items = atlas.package(package).unwrap_or_default().to_vec();
        drop(atlas);
        let mut files = Vec::new();
        for name in source_names {
            if let Some(item) = items.iter().find(|i| &i.source_name == name) {
                files.push(ResolvedFile {
                    file_name: item.file_name.clone(),
                    sample_count: item.sample_count,
                });
            }
        }
        self.cache.load_items(files).await;
    }

    /// `Running` → `Closing` → `Disposed`: awaits every in-flight decode
    /// ticket before dropping the cached buffers, so a late completion
    /// cannot resurrect an entry after disposal.
    pub async fn dispose(&self) {
        if !matches!(*self.state.read().await, SoundManagerState::Running) {
            return;
        }
        *self.state.write().await = SoundManagerState::Closing;
        debug!("disposing sound manager");
        self.cache.dispose_all().await;
        *self.state.write().await = SoundManagerState::Disposed;
    }

    /// `dispose()`, then re-enter `Running` and install `atlas`, emitting
    /// `Reloaded`. The atlas is replaced only after the Closing → Running
    /// transition completes.
    pub async fn reload(&self, url: &str) -> Result<()> {
        if !matches!(*self.state.read().await, SoundManagerState::Running) {
            warn!("reload() called while not Running; ignoring");
            return Ok(());
        }
        *self.state.write().await = SoundManagerState::Closing;
        self.cache.dispose_all().await;
        *self.state.write().await = SoundManagerState::Running;

        let json = self
            .atlas_source
            .fetch_atlas(url)
            .await
            .map_err(SonoraError::AtlasFetch)?;
        let parsed = Atlas::parse(&json)?;
        *self.atlas.write().await = parsed;
        self.events.emit(SoundEvent::Reloaded);
        Ok(())
    }
}
