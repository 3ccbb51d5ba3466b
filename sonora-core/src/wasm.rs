//! # Browser Bindings
//!
//! JS-facing sound manager facade built on `fetch` and
//! `AudioContext.decodeAudioData`. `BufferCache` drives its background
//! decodes with `tokio::spawn`, which isn't available on this target, so
//! this module doesn't reuse it — it reimplements the same
//! single-flight/placeholder shape on `Rc<RefCell<_>>` and
//! `wasm_bindgen_futures::spawn_local` instead of `Arc`/`tokio::sync::Mutex`.
//! The atlas model, resolver, and content-address parsing are plain
//! synchronous code with no `Send`/`Sync` requirements, so those are reused
//! directly.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use futures::future::{FutureExt, Shared};
use js_sys::{Float32Array, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, spawn_local, JsFuture};
use web_sys::{AudioBuffer, AudioContext, Request, RequestInit, RequestMode, Response};

use crate::atlas::Atlas;
use crate::content_address::ContentAddress;
use crate::events::SoundEvent;
use crate::resolver::resolve_item;

fn js_err(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

fn js_to_string(value: JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

/// Mirror of [`SoundEvent`]'s tag, so a JS listener can switch on a plain
/// enum instead of parsing a string. The `file_name` payload (for the two
/// load events) is passed as a separate argument to the listener callback.
#[wasm_bindgen]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JsSoundEventKind {
    AtlasLoaded,
    PackageChanged,
    LanguageChanged,
    LoadPathChanged,
    SoundLoaded,
    SoundLoadError,
    Reloaded,
}

impl From<&SoundEvent> for JsSoundEventKind {
    fn from(event: &SoundEvent) -> Self {
        match event {
            SoundEvent::AtlasLoaded => Self::AtlasLoaded,
            SoundEvent::PackageChanged => Self::PackageChanged,
            SoundEvent::LanguageChanged => Self::LanguageChanged,
            SoundEvent::LoadPathChanged => Self::LoadPathChanged,
            SoundEvent::SoundLoaded { .. } => Self::SoundLoaded,
            SoundEvent::SoundLoadError { .. } => Self::SoundLoadError,
            SoundEvent::Reloaded => Self::Reloaded,
        }
    }
}

fn event_file_name(event: &SoundEvent) -> Option<&str> {
    match event {
        SoundEvent::SoundLoaded { file_name } | SoundEvent::SoundLoadError { file_name } => {
            Some(file_name.as_str())
        }
        _ => None,
    }
}

/// A playback buffer exposed to JS. `channelData(index)` copies the
/// requested channel out as a fresh `Float32Array` snapshot — wasm-bindgen
/// can't hand JS a live view into Rust-owned memory, so callers that want
/// the post-decode samples must re-read after a `sound-loaded` event.
#[wasm_bindgen]
#[derive(Clone)]
pub struct JsAudioBuffer {
    channels: u16,
    sample_rate: u32,
    data: Rc<RefCell<Vec<Vec<f32>>>>,
}

#[wasm_bindgen]
impl JsAudioBuffer {
    #[wasm_bindgen(js_name = channelCount)]
    pub fn channel_count(&self) -> u16 {
        self.channels
    }

    #[wasm_bindgen(js_name = sampleRate)]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[wasm_bindgen(js_name = frameCount)]
    pub fn frame_count(&self) -> usize {
        self.data.borrow().first().map_or(0, Vec::len)
    }

    #[wasm_bindgen(js_name = channelData)]
    pub fn channel_data(&self, index: usize) -> Option<Float32Array> {
        self.data.borrow().get(index).map(|ch| Float32Array::from(ch.as_slice()))
    }

    /// True if the channel data hasn't been overwritten by a decode yet.
    #[wasm_bindgen(js_name = isPlaceholder)]
    pub fn is_placeholder(&self) -> bool {
        self.data
            .borrow()
            .iter()
            .all(|ch| ch.first().copied().unwrap_or(0.0) == 0.0)
    }
}

impl JsAudioBuffer {
    fn placeholder(channels: u16, sample_count: usize, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
            data: Rc::new(RefCell::new(vec![vec![0.0_f32; sample_count]; channels as usize])),
        }
    }

    fn fill_in_place(&self, decoded_channels: u16, decoded: &[Vec<f32>]) {
        let mut data = self.data.borrow_mut();
        let channel_limit = (data.len()).min(decoded_channels as usize).min(decoded.len());
        for c in 0..channel_limit {
            let target = &mut data[c];
            let source = &decoded[c];
            let frame_limit = target.len().min(source.len());
            target[..frame_limit].copy_from_slice(&source[..frame_limit]);
        }
    }

}

type LocalTicket = Shared<Pin<Box<dyn Future<Output = Result<(), String>>>>>;

struct Inner {
    atlas: Atlas,
    package: String,
    language: String,
    load_path: String,
    sample_rate: u32,
    audio_context: AudioContext,
    buffers: HashMap<String, JsAudioBuffer>,
    pending: HashMap<String, LocalTicket>,
    listeners: Vec<js_sys::Function>,
}

impl Inner {
    fn emit(&self, event: &SoundEvent) {
        let kind = JsValue::from_f64(JsSoundEventKind::from(event) as u8 as f64);
        let file_name = event_file_name(event).map(JsValue::from).unwrap_or(JsValue::UNDEFINED);
        for listener in &self.listeners {
            let _ = listener.call2(&JsValue::NULL, &kind, &file_name);
        }
    }

    fn resolve_current(&self, source_name: &str) -> Option<(String, u64)> {
        resolve_item(&self.atlas, source_name, &self.package, &self.language)
            .map(|item| (item.file_name.clone(), item.sample_count))
    }
}

async fn fetch_bytes(load_path: &str, file_name: &str) -> Result<Vec<u8>, String> {
    let window = web_sys::window().ok_or_else(|| "no global window".to_string())?;
    let opts = RequestInit::new();
    opts.set_method("GET");
    opts.set_mode(RequestMode::Cors);
    let url = format!("{load_path}{file_name}.webm");
    let request = Request::new_with_str_and_init(&url, &opts).map_err(js_to_string)?;

    let response_value = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(js_to_string)?;
    let response: Response = response_value.dyn_into().map_err(|_| "fetch() did not resolve to a Response".to_string())?;
    if !response.ok() {
        return Err(format!("http status {}", response.status()));
    }

    let array_buffer = JsFuture::from(response.array_buffer().map_err(js_to_string)?)
        .await
        .map_err(js_to_string)?;
    Ok(Uint8Array::new(&array_buffer).to_vec())
}

async fn decode_bytes(ctx: &AudioContext, bytes: Vec<u8>) -> Result<(u16, u32, Vec<Vec<f32>>), String> {
    let array_buffer = Uint8Array::from(bytes.as_slice()).buffer();
    let promise = ctx.decode_audio_data(&array_buffer).map_err(js_to_string)?;
    let decoded_value = JsFuture::from(promise).await.map_err(js_to_string)?;
    let decoded: AudioBuffer = decoded_value
        .dyn_into()
        .map_err(|_| "decodeAudioData() did not resolve to an AudioBuffer".to_string())?;

    let channels = decoded.number_of_channels() as u16;
    let sample_rate = decoded.sample_rate() as u32;
    let mut channel_data = Vec::with_capacity(channels as usize);
    for c in 0..channels {
        let mut samples = vec![0.0_f32; decoded.length() as usize];
        decoded.copy_from_channel(&mut samples, c as i32).map_err(js_to_string)?;
        channel_data.push(samples);
    }
    Ok((channels, sample_rate, channel_data))
}

/// Single public facade exposed to JS, mirroring [`crate::SoundManager`]'s
/// operations for a browser host.
#[wasm_bindgen]
pub struct JsSoundManager {
    inner: Rc<RefCell<Inner>>,
}

#[wasm_bindgen]
impl JsSoundManager {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: u32, default_package: String, default_language: String) -> Result<JsSoundManager, JsValue> {
        let audio_context = AudioContext::new().map_err(|e| js_err(js_to_string(e)))?;
        Ok(Self {
            inner: Rc::new(RefCell::new(Inner {
                atlas: Atlas::new(),
                package: default_package,
                language: default_language,
                load_path: String::new(),
                sample_rate,
                audio_context,
                buffers: HashMap::new(),
                pending: HashMap::new(),
                listeners: Vec::new(),
            })),
        })
    }

    /// Register a `(kind, fileName | undefined) => void` callback. There is
    /// no unsubscribe handle yet — listeners live as long as the manager.
    #[wasm_bindgen(js_name = addEventListener)]
    pub fn add_event_listener(&self, callback: js_sys::Function) {
        self.inner.borrow_mut().listeners.push(callback);
    }

    #[wasm_bindgen(js_name = setLoadPath)]
    pub fn set_load_path(&self, path: String) {
        self.inner.borrow_mut().load_path = path;
        self.inner.borrow().emit(&SoundEvent::LoadPathChanged);
    }

    /// Fetch and parse the atlas document at `url`, returned as a `Promise`
    /// that resolves once it has been installed.
    pub fn load(&self, url: String) -> js_sys::Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            let window = web_sys::window().ok_or_else(|| js_err("no global window"))?;
            let response_value = JsFuture::from(window.fetch_with_str(&url)).await.map_err(js_err)?;
            let response: Response = response_value.dyn_into().map_err(|_| js_err("fetch() did not resolve to a Response"))?;
            if !response.ok() {
                return Err(js_err(format!("http status {}", response.status())));
            }
            let text = JsFuture::from(response.text().map_err(js_err)?).await.map_err(js_err)?;
            let json = text.as_string().ok_or_else(|| js_err("response body was not text"))?;
            let atlas = Atlas::parse(&json).map_err(|e| js_err(e.to_string()))?;

            {
                let mut guard = inner.borrow_mut();
                guard.atlas = atlas;
            }
            inner.borrow().emit(&SoundEvent::AtlasLoaded);
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = setPackage)]
    pub fn set_package(&self, name: String) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.package == name || !inner.atlas.contains_package(&name) {
                return false;
            }
            inner.package = name;
        }
        self.inner.borrow().emit(&SoundEvent::PackageChanged);
        true
    }

    #[wasm_bindgen(js_name = setLanguage)]
    pub fn set_language(&self, tag: String) -> bool {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.language == tag || !inner.atlas.languages(&inner.package).iter().any(|l| l == &tag) {
                return false;
            }
            inner.language = tag;
        }
        self.inner.borrow().emit(&SoundEvent::LanguageChanged);
        true
    }

    #[wasm_bindgen(js_name = currentPackage)]
    pub fn current_package(&self) -> String {
        self.inner.borrow().package.clone()
    }

    #[wasm_bindgen(js_name = currentLanguage)]
    pub fn current_language(&self) -> String {
        self.inner.borrow().language.clone()
    }

    #[wasm_bindgen(js_name = packageNames)]
    pub fn package_names(&self) -> Vec<JsValue> {
        self.inner
            .borrow()
            .atlas
            .package_names()
            .map(|name| JsValue::from_str(name))
            .collect()
    }

    /// Returns a silent placeholder of the right shape immediately,
    /// kicking off the fetch+decode in the background. `None` if
    /// `sourceName` can't be resolved under the current package/language.
    #[wasm_bindgen(js_name = requestSync)]
    pub fn request_sync(&self, source_name: String) -> Option<JsAudioBuffer> {
        let (file_name, sample_count) = self.inner.borrow().resolve_current(&source_name)?;

        if let Some(existing) = self.inner.borrow().buffers.get(&file_name).cloned() {
            return Some(existing);
        }

        let channels = ContentAddress::channels_from_file_name(&file_name).ok()?;
        let sample_rate = self.inner.borrow().sample_rate;
        let placeholder = JsAudioBuffer::placeholder(channels, sample_count as usize, sample_rate);
        self.inner.borrow_mut().buffers.insert(file_name.clone(), placeholder.clone());

        let ticket = install_or_join_ticket(&self.inner, &file_name, sample_count);
        spawn_local(async move {
            let _ = ticket.await;
        });

        Some(placeholder)
    }

    /// Resolves once the file has fetched and decoded (or rejects on
    /// failure), single-flighting concurrent calls for the same file.
    #[wasm_bindgen(js_name = requestAsync)]
    pub fn request_async(&self, source_name: String) -> js_sys::Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            let resolved = inner.borrow().resolve_current(&source_name);
            let (file_name, sample_count) = resolved.ok_or_else(|| js_err(format!("no such sound: {source_name}")))?;

            if let Some(existing) = inner.borrow().buffers.get(&file_name).cloned() {
                return Ok(existing.into());
            }

            let ticket = install_or_join_ticket(&inner, &file_name, sample_count);
            ticket.await.map_err(js_err)?;
            let buffer = inner
                .borrow()
                .buffers
                .get(&file_name)
                .cloned()
                .ok_or_else(|| js_err("decode completed but buffer vanished"))?;
            Ok(buffer.into())
        })
    }

    #[wasm_bindgen(js_name = isEmpty)]
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.borrow();
        inner.buffers.is_empty() && inner.pending.is_empty()
    }

    pub fn dispose(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.buffers.clear();
        inner.pending.clear();
    }
}

/// Install a decode ticket for `file_name`, or join the one already
/// running, mirroring `BufferCache::install_or_join_ticket` but over
/// `Rc<RefCell<Inner>>` + `spawn_local` instead of `Arc` + `tokio::spawn`.
fn install_or_join_ticket(inner: &Rc<RefCell<Inner>>, file_name: &str, sample_count: u64) -> LocalTicket {
    if let Some(existing) = inner.borrow().pending.get(file_name) {
        return existing.clone();
    }

    let task_inner = inner.clone();
    let task_file_name = file_name.to_string();
    let fut: Pin<Box<dyn Future<Output = Result<(), String>>>> = Box::pin(async move {
        let (load_path, audio_context_ptr) = {
            let guard = task_inner.borrow();
            (guard.load_path.clone(), guard.audio_context.clone())
        };

        let result = async {
            let bytes = fetch_bytes(&load_path, &task_file_name).await?;
            decode_bytes(&audio_context_ptr, bytes).await
        }
        .await;

        match result {
            Ok((channels, _sample_rate, channel_data)) => {
                {
                    let mut guard = task_inner.borrow_mut();
                    match guard.buffers.get(&task_file_name) {
                        Some(existing) => existing.fill_in_place(channels, &channel_data),
                        None => {
                            let fresh = JsAudioBuffer::placeholder(channels, sample_count as usize, guard.sample_rate);
                            fresh.fill_in_place(channels, &channel_data);
                            guard.buffers.insert(task_file_name.clone(), fresh);
                        }
                    }
                }
                task_inner.borrow().emit(&SoundEvent::SoundLoaded {
                    file_name: task_file_name.clone(),
                });
                Ok(())
            }
            Err(message) => {
                task_inner.borrow().emit(&SoundEvent::SoundLoadError {
                    file_name: task_file_name.clone(),
                });
                Err(message)
            }
        }
    });

    let shared = fut.shared();
    inner.borrow_mut().pending.insert(file_name.to_string(), shared.clone());

    let cleanup_inner = inner.clone();
    let cleanup_file_name = file_name.to_string();
    let cleanup_ticket = shared.clone();
    spawn_local(async move {
        let _ = cleanup_ticket.await;
        cleanup_inner.borrow_mut().pending.remove(&cleanup_file_name);
    });

    shared
}

#[wasm_bindgen(js_name = sonoraCoreVersion)]
pub fn sonora_core_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
