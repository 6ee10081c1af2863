use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use shared::{
    domain::{file_extension, ExtType, ExtensionName, ExtensionNameError},
    protocol::{ExtensionItem, RawExtensionItem},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

pub mod config;
pub mod error;
pub mod transport;
pub mod types;

pub use config::{load_settings, ControllerSettings};
pub use error::{ControllerError, StoreError, ValidationError};
pub use transport::{ExtensionStore, HttpExtensionStore};
pub use types::{AddOutcome, ControllerEvent, ExtensionView};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Owns the client-side view of the blocklist and keeps it in step with the
/// remote store.
///
/// The state lock is never held across a store call. Concurrent actions race
/// and their completions apply in arrival order; adds in flight are reserved
/// so uniqueness and capacity hold regardless of that order.
pub struct ExtensionSetController {
    store: Arc<dyn ExtensionStore>,
    max_count: usize,
    vocabulary: Vec<ExtensionName>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

#[derive(Default)]
struct ControllerState {
    fixed: HashSet<ExtensionName>,
    custom: Vec<ExtensionName>,
    pending_custom: HashSet<ExtensionName>,
    checkboxes: HashMap<ExtensionName, bool>,
    /// Names the store holds that neither container lists. Uploads with
    /// these extensions are still rejected.
    unlisted: HashSet<String>,
    input: String,
}

struct Snapshot {
    fixed: HashSet<ExtensionName>,
    custom: Vec<ExtensionName>,
    unlisted: HashSet<String>,
}

impl ExtensionSetController {
    pub fn new(store: Arc<dyn ExtensionStore>, settings: &ControllerSettings) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut vocabulary: Vec<ExtensionName> = Vec::new();
        for name in &settings.fixed_extensions {
            if !vocabulary.contains(name) {
                vocabulary.push(name.clone());
            }
        }
        Arc::new(Self {
            store,
            max_count: settings.max_count,
            vocabulary,
            inner: Mutex::new(ControllerState::default()),
            events,
        })
    }

    /// Controller backed by [`HttpExtensionStore`] at `settings.base_url`.
    pub fn from_settings(settings: &ControllerSettings) -> Result<Arc<Self>, StoreError> {
        let store = HttpExtensionStore::new(&settings.base_url)?;
        Ok(Self::new(Arc::new(store), settings))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn vocabulary(&self) -> &[ExtensionName] {
        &self.vocabulary
    }

    /// Fixed extensions currently blocked, in vocabulary order.
    pub async fn fixed_extensions(&self) -> Vec<ExtensionName> {
        let guard = self.inner.lock().await;
        self.vocabulary
            .iter()
            .filter(|name| guard.fixed.contains(*name))
            .cloned()
            .collect()
    }

    pub async fn custom_extensions(&self) -> Vec<ExtensionName> {
        self.inner.lock().await.custom.clone()
    }

    pub async fn view(&self) -> ExtensionView {
        let guard = self.inner.lock().await;
        self.build_view(&guard)
    }

    /// Replaces both containers with the store's snapshot.
    ///
    /// A failed fetch leaves the containers untouched and is only logged;
    /// no notice reaches the user. The error is still returned so a caller
    /// can offer a retry.
    pub async fn load_snapshot(&self) -> Result<(), ControllerError> {
        let items = match self.store.fetch_all().await {
            Ok(items) => items,
            Err(err) => {
                error!(%err, "extension snapshot load failed; blocklist stays empty");
                return Err(ControllerError::InitialLoad(err));
            }
        };

        let snapshot = self.partition_snapshot(items);

        let (view, toggled) = {
            let mut guard = self.inner.lock().await;
            let mut toggled = Vec::new();
            for name in &self.vocabulary {
                let checked = snapshot.fixed.contains(name);
                let previous = guard.checkboxes.insert(name.clone(), checked);
                if previous.unwrap_or(false) != checked {
                    toggled.push((name.clone(), checked));
                }
            }
            guard.fixed = snapshot.fixed;
            guard.custom = snapshot.custom;
            guard.unlisted = snapshot.unlisted;
            (self.build_view(&guard), toggled)
        };

        info!(
            fixed = view.checkboxes.iter().filter(|(_, checked)| *checked).count(),
            custom = view.tags.len(),
            "extension snapshot loaded"
        );
        for (name, checked) in toggled {
            self.emit(ControllerEvent::FixedCheckboxChanged { name, checked });
        }
        self.emit(ControllerEvent::ViewUpdated(view));
        Ok(())
    }

    /// Splits a snapshot into the two containers. Entries that cannot be
    /// listed without breaking an invariant stay in `unlisted` so the upload
    /// check still sees everything the store blocks.
    fn partition_snapshot(&self, items: Vec<RawExtensionItem>) -> Snapshot {
        let mut snapshot = Snapshot {
            fixed: HashSet::new(),
            custom: Vec::new(),
            unlisted: HashSet::new(),
        };

        let mut parsed = Vec::with_capacity(items.len());
        for item in items {
            match ExtensionName::parse(&item.ext_name) {
                Ok(name) => parsed.push((name, item.ext_type)),
                Err(ExtensionNameError::Empty) => {}
                Err(err) => {
                    warn!(extension = %item.ext_name, %err, "malformed snapshot entry kept unlisted");
                    snapshot
                        .unlisted
                        .insert(item.ext_name.trim().to_lowercase());
                }
            }
        }

        for (name, _) in parsed.iter().filter(|(_, kind)| *kind == ExtType::Fixed) {
            if self.vocabulary.contains(name) {
                snapshot.fixed.insert(name.clone());
            } else {
                warn!(extension = %name, "fixed entry outside the vocabulary kept unlisted");
                snapshot.unlisted.insert(name.to_string());
            }
        }

        for (name, _) in parsed.into_iter().filter(|(_, kind)| *kind == ExtType::Custom) {
            if snapshot.custom.contains(&name) {
                continue;
            }
            if self.vocabulary.contains(&name) {
                warn!(extension = %name, "custom entry shadows a fixed extension; kept unlisted");
                snapshot.unlisted.insert(name.into_inner());
            } else if snapshot.custom.len() >= self.max_count {
                warn!(extension = %name, max = self.max_count, "custom entry beyond capacity kept unlisted");
                snapshot.unlisted.insert(name.into_inner());
            } else {
                snapshot.custom.push(name);
            }
        }

        snapshot
    }

    /// Checkbox handler. The widget flips immediately; the fixed set only
    /// changes once the store confirms, and the widget is reverted otherwise.
    pub async fn set_fixed_membership(
        &self,
        extension: &str,
        enabled: bool,
    ) -> Result<(), ControllerError> {
        let name = self
            .vocabulary_entry(extension)
            .ok_or_else(|| ControllerError::UnknownFixedExtension(extension.to_string()))?;

        let previous = {
            let mut guard = self.inner.lock().await;
            guard
                .checkboxes
                .insert(name.clone(), enabled)
                .unwrap_or(false)
        };
        self.emit(ControllerEvent::FixedCheckboxChanged {
            name: name.clone(),
            checked: enabled,
        });

        let result = if enabled {
            self.store.add(&ExtensionItem::fixed(name.clone())).await
        } else {
            self.store.remove(&name).await
        };

        match result {
            Ok(()) => {
                let view = {
                    let mut guard = self.inner.lock().await;
                    if enabled {
                        guard.fixed.insert(name.clone());
                    } else {
                        guard.fixed.remove(&name);
                        guard.unlisted.remove(name.as_str());
                    }
                    self.build_view(&guard)
                };
                info!(extension = %name, enabled, "fixed extension updated");
                self.emit(ControllerEvent::ViewUpdated(view));
                Ok(())
            }
            Err(source) => {
                {
                    let mut guard = self.inner.lock().await;
                    guard.checkboxes.insert(name.clone(), previous);
                }
                self.emit(ControllerEvent::FixedCheckboxChanged {
                    name,
                    checked: previous,
                });
                Err(self.notify(ControllerError::remote("fixed extension update", source)))
            }
        }
    }

    /// Records the draft text of the add field and refreshes the view.
    pub async fn set_input(&self, text: &str) -> ExtensionView {
        let view = {
            let mut guard = self.inner.lock().await;
            guard.input = text.to_string();
            self.build_view(&guard)
        };
        self.emit(ControllerEvent::ViewUpdated(view.clone()));
        view
    }

    /// Add-button handler: submits the current draft.
    pub async fn submit_input(&self) -> Result<AddOutcome, ControllerError> {
        let draft = self.inner.lock().await.input.clone();
        self.add_custom(&draft).await
    }

    pub async fn add_custom(&self, raw: &str) -> Result<AddOutcome, ControllerError> {
        let name = {
            let mut guard = self.inner.lock().await;
            let name = match self.validate_custom(&guard, raw) {
                Ok(Some(name)) => name,
                Ok(None) => return Ok(AddOutcome::Ignored),
                Err(err) => {
                    drop(guard);
                    return Err(self.notify(err.into()));
                }
            };
            guard.pending_custom.insert(name.clone());
            name
        };

        let result = self.store.add(&ExtensionItem::custom(name.clone())).await;

        let mut guard = self.inner.lock().await;
        guard.pending_custom.remove(&name);
        match result {
            Ok(()) if !guard.custom.contains(&name) && guard.custom.len() >= self.max_count => {
                // A snapshot filled the list while the add was in flight.
                guard.unlisted.insert(name.to_string());
                drop(guard);
                warn!(extension = %name, max = self.max_count, "custom extension stored but list is full");
                self.emit(ControllerEvent::Notice(format!(
                    "\"{name}\" was saved but the list is full; reload to see it"
                )));
                Ok(AddOutcome::Unlisted(name))
            }
            Ok(()) => {
                if !guard.custom.contains(&name) {
                    guard.custom.push(name.clone());
                }
                guard.unlisted.remove(name.as_str());
                guard.input.clear();
                let view = self.build_view(&guard);
                drop(guard);
                info!(extension = %name, "custom extension added");
                self.emit(ControllerEvent::ViewUpdated(view));
                Ok(AddOutcome::Added(name))
            }
            Err(source) => {
                drop(guard);
                Err(self.notify(ControllerError::remote("custom extension add", source)))
            }
        }
    }

    fn validate_custom(
        &self,
        state: &ControllerState,
        raw: &str,
    ) -> Result<Option<ExtensionName>, ValidationError> {
        let name = match ExtensionName::parse(raw) {
            Ok(name) => name,
            Err(ExtensionNameError::Empty) => return Ok(None),
            Err(ExtensionNameError::NotAlphanumeric(_)) => {
                return Err(ValidationError::NotAlphanumeric)
            }
        };
        if state.fixed.contains(&name) || self.vocabulary.contains(&name) {
            return Err(ValidationError::AlreadyFixed(name));
        }
        if state.custom.contains(&name)
            || state.pending_custom.contains(&name)
            || state.unlisted.contains(name.as_str())
        {
            return Err(ValidationError::AlreadyRegistered(name));
        }
        if state.custom.len() + state.pending_custom.len() >= self.max_count {
            return Err(ValidationError::CapacityReached {
                max: self.max_count,
            });
        }
        Ok(Some(name))
    }

    /// Tag delete handler. Entries are addressed by value, so a stale or
    /// repeated click can never remove a neighbouring tag.
    pub async fn remove_custom(&self, extension: &str) -> Result<(), ControllerError> {
        let not_registered = || ControllerError::NotRegistered(extension.trim().to_string());
        let name = ExtensionName::parse(extension).map_err(|_| not_registered())?;
        if !self.inner.lock().await.custom.contains(&name) {
            return Err(not_registered());
        }

        match self.store.remove(&name).await {
            Ok(()) => {
                let view = {
                    let mut guard = self.inner.lock().await;
                    guard.custom.retain(|entry| entry != &name);
                    guard.unlisted.remove(name.as_str());
                    self.build_view(&guard)
                };
                info!(extension = %name, "custom extension removed");
                self.emit(ControllerEvent::ViewUpdated(view));
                Ok(())
            }
            Err(source) => Err(self.notify(ControllerError::remote(
                "custom extension delete",
                source,
            ))),
        }
    }

    /// File selection handler. Purely local; a blocked selection is cleared.
    pub async fn check_file_against_blocklist(
        &self,
        filename: &str,
    ) -> Result<(), ControllerError> {
        let extension = file_extension(filename);
        let blocked = {
            let guard = self.inner.lock().await;
            guard.fixed.iter().any(|name| name.as_str() == extension)
                || guard.custom.iter().any(|name| name.as_str() == extension)
                || guard.unlisted.contains(&extension)
        };
        if !blocked {
            return Ok(());
        }

        info!(filename, %extension, "upload rejected by blocklist");
        let err = self.notify(ControllerError::Blocked { extension });
        self.emit(ControllerEvent::SelectionCleared);
        Err(err)
    }

    fn vocabulary_entry(&self, extension: &str) -> Option<ExtensionName> {
        let name = ExtensionName::parse(extension).ok()?;
        self.vocabulary.contains(&name).then_some(name)
    }

    fn build_view(&self, state: &ControllerState) -> ExtensionView {
        ExtensionView {
            tags: state.custom.clone(),
            count_display: format!("{}/{}", state.custom.len(), self.max_count),
            add_enabled: !state.input.trim().is_empty() && state.custom.len() < self.max_count,
            checkboxes: self
                .vocabulary
                .iter()
                .map(|name| {
                    let checked = state.checkboxes.get(name).copied().unwrap_or(false);
                    (name.clone(), checked)
                })
                .collect(),
        }
    }

    fn notify(&self, err: ControllerError) -> ControllerError {
        if !err.is_validation() {
            warn!(%err, "extension action failed");
        }
        self.emit(ControllerEvent::Notice(err.to_string()));
        err
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod transport_tests;
