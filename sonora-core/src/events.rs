//! # Sound Manager Events
//!
//! The closed set of observations a [`crate::SoundManager`] emits, dispatched
//! through `sonora_runtime::events::EventBus`.

/// Fire-and-forget notification emitted by the sound manager. Every variant
/// carries exactly the payload a listener needs for it — unit for most, the
/// affected `file_name` for the two load events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundEvent {
    /// The atlas was (re)loaded, via `load` or `replace`.
    AtlasLoaded,
    /// `set_package` succeeded.
    PackageChanged,
    /// `set_language` succeeded.
    LanguageChanged,
    /// The runtime load path changed.
    LoadPathChanged,
    /// A file finished fetching and decoding successfully.
    SoundLoaded { file_name: String },
    /// A file failed to fetch or decode.
    SoundLoadError { file_name: String },
    /// `reload()` completed and the manager is back in `Running`.
    Reloaded,
}

pub type EventBus = sonora_runtime::events::EventBus<SoundEvent>;
pub type Subscription = sonora_runtime::events::Subscription<SoundEvent>;
