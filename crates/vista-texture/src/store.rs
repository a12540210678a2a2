//! Frame-epoch texture cache.
//!
//! Each frame the caller runs `start_frame`, marks every tile it wants, and
//! finishes with `end_frame`, which sweeps what was not marked:
//!
//! * in-flight loads for unmarked, unpinned tiles are cancelled,
//! * failed or idle unmarked entries are dropped,
//! * loaded textures unmarked for more than `retain_frames` frames are
//!   destroyed,
//! * stale, unpinned textures are evicted in policy order until resident
//!   memory fits the budget.
//!
//! Pinned entries are never swept. A budget that cannot be met with the
//! remaining visible and pinned textures is reported through
//! [`StoreStats::over_budget`], never as an error.

use std::fmt;
use std::mem;

use crossbeam_channel::{Receiver, Sender};
use glam::DVec3;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};
use vista_config::Config;
use vista_core::{Emitter, Tile};
use vista_lod::{EvictionCandidate, LodPolicy, MemoryBudget, select_evictions};

use crate::asset::Asset;
use crate::completion::{CancelHandle, CancelToken, Completed, Completion, Ticket};
use crate::error::{LoadError, StoreError};
use crate::source::{Backend, Source};

/// Maps a tile to its world-space centre, used by distance-based eviction.
pub type TileLocator = Box<dyn Fn(Tile) -> DVec3>;

/// Store tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StoreOptions {
    /// Frames an unmarked, unpinned texture stays cached.
    pub retain_frames: u32,
    pub policy: LodPolicy,
}

impl StoreOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retain_frames: config.store.retain_frames,
            policy: config.lod,
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Notifications emitted by the store.
#[derive(Clone, Debug, PartialEq)]
pub enum StoreEvent {
    /// A load was started for a tile.
    StartLoad(Tile),
    /// A tile's texture became available.
    Load(Tile),
    /// Loading a tile failed; it is retried the next frame it is marked.
    Error(Tile, LoadError),
    /// An in-flight load was cancelled.
    Cancel(Tile),
    /// A dynamic tile's texture was refreshed and needs redrawing.
    Invalid(Tile),
    /// A tile's texture was destroyed.
    Evict(Tile),
}

/// Coarse load state reported by [`TextureStore::query`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    /// No load running, e.g. after an external cancel.
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Snapshot of one cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileState {
    pub status: LoadStatus,
    /// Marked in the current frame.
    pub visible: bool,
    pub pin_count: u32,
    pub last_seen_epoch: u64,
    /// Texture bytes charged to the budget, 0 until loaded.
    pub bytes: u64,
}

impl TileState {
    pub fn has_texture(&self) -> bool {
        self.status == LoadStatus::Loaded
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }
}

/// Cache statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StoreStats {
    pub epoch: u64,
    pub entries: usize,
    pub loading: usize,
    pub loaded: usize,
    pub failed: usize,
    pub pinned: usize,
    pub resident_bytes: u64,
    pub budget_bytes: u64,
    /// Resident memory still exceeded the budget after the last sweep.
    pub over_budget: bool,
    /// Marks that found a texture ready.
    pub hits: u64,
    /// Marks that found no texture.
    pub misses: u64,
    pub evictions: u64,
    pub cancellations: u64,
    pub load_errors: u64,
}

impl StoreStats {
    pub fn resident_mb(&self) -> f64 {
        self.resident_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    cancellations: u64,
    load_errors: u64,
}

enum LoadState<A, X> {
    Idle,
    LoadingAsset {
        ticket: Ticket,
        token: CancelToken,
        handle: CancelHandle,
    },
    CreatingTexture {
        ticket: Ticket,
        token: CancelToken,
        handle: CancelHandle,
        asset: A,
    },
    Loaded {
        asset: A,
        texture: X,
        asset_timestamp: u64,
    },
    Failed {
        epoch: u64,
    },
}

impl<A, X> LoadState<A, X> {
    fn status(&self) -> LoadStatus {
        match self {
            LoadState::Idle => LoadStatus::Idle,
            LoadState::LoadingAsset { .. } | LoadState::CreatingTexture { .. } => {
                LoadStatus::Loading
            }
            LoadState::Loaded { .. } => LoadStatus::Loaded,
            LoadState::Failed { .. } => LoadStatus::Failed,
        }
    }

    /// Cancel an in-flight load. Returns `false` for any other state.
    fn abort(self) -> bool {
        match self {
            LoadState::LoadingAsset {
                token, mut handle, ..
            }
            | LoadState::CreatingTexture {
                token, mut handle, ..
            } => {
                token.cancel();
                handle.cancel();
                true
            }
            _ => false,
        }
    }
}

struct Entry<A, X> {
    state: LoadState<A, X>,
    pin_count: u32,
    last_seen: u64,
    bytes: u64,
}

impl<A, X> Entry<A, X> {
    fn new(epoch: u64) -> Self {
        Self {
            state: LoadState::Idle,
            pin_count: 0,
            last_seen: epoch,
            bytes: 0,
        }
    }

    fn is_loaded(&self) -> bool {
        matches!(self.state, LoadState::Loaded { .. })
    }
}

enum MarkAction {
    Load,
    Refresh,
    Nothing,
}

/// Tile texture cache driving a [`Source`] and a [`Backend`].
pub struct TextureStore<S: Source, B: Backend<S::Asset>> {
    source: S,
    backend: B,
    entries: FxHashMap<Tile, Entry<S::Asset, B::Texture>>,
    options: StoreOptions,
    budget: MemoryBudget,
    epoch: u64,
    next_ticket: Ticket,
    focus: DVec3,
    locator: Option<TileLocator>,
    asset_sender: Sender<Completed<S::Asset>>,
    asset_receiver: Receiver<Completed<S::Asset>>,
    texture_sender: Sender<Completed<B::Texture>>,
    texture_receiver: Receiver<Completed<B::Texture>>,
    counters: Counters,
    over_budget: bool,
    events: Emitter<StoreEvent>,
}

impl<S: Source, B: Backend<S::Asset>> TextureStore<S, B> {
    pub fn new(source: S, backend: B, options: StoreOptions) -> Self {
        let (asset_sender, asset_receiver) = crossbeam_channel::unbounded();
        let (texture_sender, texture_receiver) = crossbeam_channel::unbounded();
        Self {
            source,
            backend,
            entries: FxHashMap::default(),
            budget: MemoryBudget::from_policy(&options.policy),
            options,
            epoch: 0,
            next_ticket: 0,
            focus: DVec3::NEG_Z,
            locator: None,
            asset_sender,
            asset_receiver,
            texture_sender,
            texture_receiver,
            counters: Counters::default(),
            over_budget: false,
            events: Emitter::new(),
        }
    }

    /// Begin a new frame epoch and take in finished loads.
    pub fn start_frame(&mut self) {
        self.epoch += 1;
        trace!(epoch = self.epoch, "Texture store frame started");
        self.drain_completions();
    }

    /// Declare `tile` wanted in the current frame.
    pub fn mark_tile(&mut self, tile: Tile) {
        let epoch = self.epoch;
        let action = match self.entries.get_mut(&tile) {
            None => {
                self.entries.insert(tile, Entry::new(epoch));
                MarkAction::Load
            }
            Some(entry) => {
                entry.last_seen = entry.last_seen.max(epoch);
                match &entry.state {
                    LoadState::Loaded { asset, asset_timestamp, .. } => {
                        if asset.is_dynamic() && asset.timestamp() > *asset_timestamp {
                            MarkAction::Refresh
                        } else {
                            MarkAction::Nothing
                        }
                    }
                    LoadState::Idle => MarkAction::Load,
                    LoadState::Failed { epoch: failed } if *failed < epoch => MarkAction::Load,
                    _ => MarkAction::Nothing,
                }
            }
        };

        let has_texture = self.entries.get(&tile).is_some_and(Entry::is_loaded);
        if has_texture {
            self.counters.hits += 1;
        } else {
            self.counters.misses += 1;
        }

        match action {
            MarkAction::Load => self.start_load(tile),
            MarkAction::Refresh => self.refresh(tile),
            MarkAction::Nothing => {}
        }
    }

    /// Sweep unmarked entries and enforce the memory budget.
    pub fn end_frame(&mut self) {
        self.drain_completions();
        let epoch = self.epoch;

        let mut superseded: Vec<Tile> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry.pin_count == 0 && entry.last_seen < epoch && !entry.is_loaded()
            })
            .map(|(tile, _)| *tile)
            .collect();
        superseded.sort_unstable();
        for tile in superseded {
            self.release(tile);
        }

        let retain = u64::from(self.options.retain_frames);
        let mut expired: Vec<Tile> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry.pin_count == 0 && entry.is_loaded() && epoch - entry.last_seen > retain
            })
            .map(|(tile, _)| *tile)
            .collect();
        expired.sort_unstable();
        for tile in expired {
            self.release(tile);
        }

        if self.budget.is_over_budget() {
            self.evict_to_budget();
        }
        self.update_over_budget();
    }

    fn evict_to_budget(&mut self) {
        let epoch = self.epoch;
        let candidates: Vec<EvictionCandidate> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.pin_count == 0 && entry.is_loaded() && entry.last_seen < epoch)
            .map(|(tile, entry)| EvictionCandidate {
                tile: *tile,
                bytes: entry.bytes,
                last_seen_epoch: entry.last_seen,
                center: self.locator.as_ref().map_or(DVec3::ZERO, |locate| locate(*tile)),
            })
            .collect();

        let victims = select_evictions(
            &candidates,
            self.budget.overage(),
            self.options.policy.eviction_strategy,
            epoch,
            self.focus,
        );
        debug!(
            strategy = %self.options.policy.eviction_strategy,
            candidates = candidates.len(),
            victims = victims.len(),
            overage = self.budget.overage(),
            "Evicting to texture budget"
        );
        for tile in victims {
            self.release(tile);
        }
    }

    fn update_over_budget(&mut self) {
        let over = self.budget.is_over_budget();
        if over && !self.over_budget {
            warn!(
                resident_mb = self.budget.resident_mb(),
                limit_bytes = self.budget.limit_bytes(),
                "Texture memory over budget; remaining textures are visible or pinned"
            );
        } else if !over && self.over_budget {
            debug!(resident_mb = self.budget.resident_mb(), "Texture memory back within budget");
        }
        self.over_budget = over;
    }

    /// Take in finished loads without starting or ending a frame.
    pub fn poll(&mut self) {
        self.drain_completions();
    }

    /// Exempt `tile` from eviction, loading it if unknown or if its last
    /// load failed in an earlier frame. Returns the new pin count.
    pub fn pin(&mut self, tile: Tile) -> u32 {
        let epoch = self.epoch;
        let entry = self.entries.entry(tile).or_insert_with(|| Entry::new(epoch));
        entry.pin_count += 1;
        let count = entry.pin_count;
        let retry = match entry.state {
            LoadState::Idle => true,
            LoadState::Failed { epoch: failed } => failed < epoch,
            _ => false,
        };
        if retry {
            self.start_load(tile);
        }
        count
    }

    /// Release one pin. Returns the remaining pin count.
    pub fn unpin(&mut self, tile: Tile) -> Result<u32, StoreError> {
        match self.entries.get_mut(&tile) {
            Some(entry) if entry.pin_count > 0 => {
                entry.pin_count -= 1;
                Ok(entry.pin_count)
            }
            _ => Err(StoreError::NotPinned(tile)),
        }
    }

    pub fn query(&self, tile: Tile) -> Option<TileState> {
        self.entries.get(&tile).map(|entry| TileState {
            status: entry.state.status(),
            visible: entry.last_seen == self.epoch,
            pin_count: entry.pin_count,
            last_seen_epoch: entry.last_seen,
            bytes: entry.bytes,
        })
    }

    /// The tile's texture, once loaded.
    pub fn texture(&self, tile: Tile) -> Option<&B::Texture> {
        match &self.entries.get(&tile)?.state {
            LoadState::Loaded { texture, .. } => Some(texture),
            _ => None,
        }
    }

    /// The tile's asset, once decoded.
    pub fn asset(&self, tile: Tile) -> Option<&S::Asset> {
        match &self.entries.get(&tile)?.state {
            LoadState::CreatingTexture { asset, .. } | LoadState::Loaded { asset, .. } => {
                Some(asset)
            }
            _ => None,
        }
    }

    /// Cancel the tile's in-flight load. The entry stays, idle, and loads
    /// again the next time it is marked. Returns `false` if nothing was
    /// loading.
    pub fn cancel(&mut self, tile: Tile) -> bool {
        let Some(entry) = self.entries.get_mut(&tile) else {
            return false;
        };
        if entry.state.status() != LoadStatus::Loading {
            return false;
        }
        mem::replace(&mut entry.state, LoadState::Idle).abort();
        self.counters.cancellations += 1;
        debug!(%tile, "Cancelled tile load on request");
        self.events.emit(&StoreEvent::Cancel(tile));
        true
    }

    /// Drop every entry, pinned or not.
    pub fn clear(&mut self) {
        let mut tiles: Vec<Tile> = self.entries.keys().copied().collect();
        tiles.sort_unstable();
        for tile in tiles {
            self.release(tile);
        }
        self.update_over_budget();
    }

    /// Drop every unpinned entry.
    pub fn clear_not_pinned(&mut self) {
        let mut tiles: Vec<Tile> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.pin_count == 0)
            .map(|(tile, _)| *tile)
            .collect();
        tiles.sort_unstable();
        for tile in tiles {
            self.release(tile);
        }
        self.update_over_budget();
    }

    /// Replace the budget and eviction policy. Applied at the next sweep.
    pub fn set_policy(&mut self, policy: LodPolicy) {
        self.options.policy = policy;
        self.budget.set_limit(policy.max_gpu_bytes());
    }

    pub fn policy(&self) -> &LodPolicy {
        &self.options.policy
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Current view direction, for distance-based eviction.
    pub fn set_focus(&mut self, direction: DVec3) {
        self.focus = direction;
    }

    pub fn set_locator(&mut self, locator: TileLocator) {
        self.locator = Some(locator);
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            epoch: self.epoch,
            entries: self.entries.len(),
            resident_bytes: self.budget.resident_bytes(),
            budget_bytes: self.budget.limit_bytes(),
            over_budget: self.over_budget,
            hits: self.counters.hits,
            misses: self.counters.misses,
            evictions: self.counters.evictions,
            cancellations: self.counters.cancellations,
            load_errors: self.counters.load_errors,
            ..StoreStats::default()
        };
        for entry in self.entries.values() {
            match entry.state.status() {
                LoadStatus::Loading => stats.loading += 1,
                LoadStatus::Loaded => stats.loaded += 1,
                LoadStatus::Failed => stats.failed += 1,
                LoadStatus::Idle => {}
            }
            if entry.pin_count > 0 {
                stats.pinned += 1;
            }
        }
        stats
    }

    /// Zero the hit, miss, eviction, cancellation and error counters.
    pub fn reset_counters(&mut self) {
        self.counters = Counters::default();
    }

    pub fn events(&mut self) -> &mut Emitter<StoreEvent> {
        &mut self.events
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn issue_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn start_load(&mut self, tile: Tile) {
        let ticket = self.issue_ticket();
        let token = CancelToken::new();
        let completion = Completion::new(ticket, tile, token.clone(), self.asset_sender.clone());
        let handle = self.source.load_asset(tile, completion);
        if let Some(entry) = self.entries.get_mut(&tile) {
            entry.state = LoadState::LoadingAsset {
                ticket,
                token,
                handle,
            };
        }
        debug!(%tile, ticket, "Loading tile");
        self.events.emit(&StoreEvent::StartLoad(tile));
    }

    fn refresh(&mut self, tile: Tile) {
        let Some(entry) = self.entries.get_mut(&tile) else {
            return;
        };
        let LoadState::Loaded {
            asset,
            texture,
            asset_timestamp,
        } = &mut entry.state
        else {
            return;
        };
        self.backend.refresh_texture(tile, texture, asset);
        *asset_timestamp = asset.timestamp();
        let bytes = asset.byte_size();
        if bytes != entry.bytes {
            self.budget.on_texture_destroyed(entry.bytes);
            self.budget.on_texture_created(bytes);
            entry.bytes = bytes;
        }
        trace!(%tile, "Refreshed dynamic tile texture");
        self.events.emit(&StoreEvent::Invalid(tile));
    }

    fn drain_completions(&mut self) {
        loop {
            let mut progressed = false;
            while let Ok(done) = self.asset_receiver.try_recv() {
                progressed = true;
                self.on_asset(done);
            }
            while let Ok(done) = self.texture_receiver.try_recv() {
                progressed = true;
                self.on_texture(done);
            }
            if !progressed {
                break;
            }
        }
    }

    fn on_asset(&mut self, done: Completed<S::Asset>) {
        let Completed { ticket, tile, result } = done;
        let Some(entry) = self.entries.get_mut(&tile) else {
            trace!(%tile, ticket, "Discarding asset for released tile");
            return;
        };
        if !matches!(&entry.state, LoadState::LoadingAsset { ticket: current, .. } if *current == ticket)
        {
            trace!(%tile, ticket, "Discarding stale asset");
            return;
        }

        match result {
            Ok(asset) => {
                let token = CancelToken::new();
                let completion =
                    Completion::new(ticket, tile, token.clone(), self.texture_sender.clone());
                let handle = self.backend.create_texture(tile, &asset, completion);
                entry.state = LoadState::CreatingTexture {
                    ticket,
                    token,
                    handle,
                    asset,
                };
            }
            Err(error) => self.fail(tile, error),
        }
    }

    fn on_texture(&mut self, done: Completed<B::Texture>) {
        let Completed { ticket, tile, result } = done;
        let current = self.entries.get(&tile).is_some_and(|entry| {
            matches!(&entry.state, LoadState::CreatingTexture { ticket: current, .. } if *current == ticket)
        });
        if !current {
            trace!(%tile, ticket, "Discarding stale texture");
            if let Ok(texture) = result {
                self.backend.destroy_texture(tile, texture);
            }
            return;
        }

        match result {
            Ok(texture) => {
                let Some(entry) = self.entries.get_mut(&tile) else {
                    return;
                };
                let LoadState::CreatingTexture { asset, .. } =
                    mem::replace(&mut entry.state, LoadState::Idle)
                else {
                    return;
                };
                let bytes = asset.byte_size();
                entry.bytes = bytes;
                entry.state = LoadState::Loaded {
                    asset_timestamp: asset.timestamp(),
                    asset,
                    texture,
                };
                self.budget.on_texture_created(bytes);
                debug!(%tile, bytes, "Tile texture loaded");
                self.events.emit(&StoreEvent::Load(tile));
            }
            Err(error) => self.fail(tile, error),
        }
    }

    fn fail(&mut self, tile: Tile, error: LoadError) {
        let epoch = self.epoch;
        if let Some(entry) = self.entries.get_mut(&tile) {
            entry.state = LoadState::Failed { epoch };
        }
        self.counters.load_errors += 1;
        warn!(%tile, %error, "Tile load failed");
        self.events.emit(&StoreEvent::Error(tile, error));
    }

    /// Remove an entry, cancelling its load or destroying its texture.
    fn release(&mut self, tile: Tile) {
        let Some(entry) = self.entries.remove(&tile) else {
            return;
        };
        match entry.state {
            LoadState::Loaded { texture, .. } => {
                self.backend.destroy_texture(tile, texture);
                self.budget.on_texture_destroyed(entry.bytes);
                self.counters.evictions += 1;
                debug!(%tile, bytes = entry.bytes, "Evicted tile texture");
                self.events.emit(&StoreEvent::Evict(tile));
            }
            state => {
                if state.abort() {
                    self.counters.cancellations += 1;
                    debug!(%tile, "Cancelled superseded tile load");
                    self.events.emit(&StoreEvent::Cancel(tile));
                }
            }
        }
    }
}

impl<S: Source, B: Backend<S::Asset>> Drop for TextureStore<S, B> {
    fn drop(&mut self) {
        for (tile, entry) in self.entries.drain() {
            match entry.state {
                LoadState::Loaded { texture, .. } => {
                    self.backend.destroy_texture(tile, texture);
                    self.budget.on_texture_destroyed(entry.bytes);
                }
                state => {
                    state.abort();
                }
            }
        }
        // Textures delivered but not yet taken in.
        while let Ok(done) = self.texture_receiver.try_recv() {
            if let Ok(texture) = done.result {
                self.backend.destroy_texture(done.tile, texture);
            }
        }
    }
}

impl<S: Source, B: Backend<S::Asset>> fmt::Debug for TextureStore<S, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureStore")
            .field("epoch", &self.epoch)
            .field("entries", &self.entries.len())
            .field("budget", &self.budget)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use vista_lod::EvictionStrategy;

    const TILE_BYTES: u64 = 64 * 64 * 4;

    #[derive(Debug)]
    struct TestAsset {
        size: u32,
        version: Option<Arc<AtomicU64>>,
    }

    impl TestAsset {
        fn fixed() -> Self {
            Self {
                size: 64,
                version: None,
            }
        }
    }

    impl Asset for TestAsset {
        fn width(&self) -> u32 {
            self.size
        }

        fn height(&self) -> u32 {
            self.size
        }

        fn is_dynamic(&self) -> bool {
            self.version.is_some()
        }

        fn timestamp(&self) -> u64 {
            self.version
                .as_ref()
                .map_or(0, |version| version.load(Ordering::SeqCst))
        }
    }

    /// Source whose loads are resolved by the test.
    #[derive(Clone, Default)]
    struct ManualSource {
        pending: Rc<RefCell<Vec<Completion<TestAsset>>>>,
        cancelled: Rc<RefCell<Vec<Tile>>>,
        requests: Rc<Cell<usize>>,
    }

    impl ManualSource {
        fn resolve(&self, tile: Tile, result: Result<TestAsset, LoadError>) -> bool {
            let mut pending = self.pending.borrow_mut();
            let index = pending
                .iter()
                .position(|completion| completion.tile() == tile)
                .expect("no pending load for tile");
            pending.remove(index).complete(result).is_ok()
        }

        fn resolve_all(&self) {
            let pending: Vec<_> = self.pending.borrow_mut().drain(..).collect();
            for completion in pending {
                let _ = completion.succeed(TestAsset::fixed());
            }
        }
    }

    impl Source for ManualSource {
        type Asset = TestAsset;

        fn load_asset(&mut self, tile: Tile, completion: Completion<TestAsset>) -> CancelHandle {
            self.requests.set(self.requests.get() + 1);
            self.pending.borrow_mut().push(completion);
            let cancelled = Rc::clone(&self.cancelled);
            CancelHandle::new(move || cancelled.borrow_mut().push(tile))
        }
    }

    /// Backend creating textures synchronously, or queueing the requests
    /// for the test to resolve when `defer` is set.
    #[derive(Clone, Default)]
    struct TestBackend {
        created: Rc<Cell<usize>>,
        destroyed: Rc<RefCell<Vec<Tile>>>,
        refreshed: Rc<RefCell<Vec<Tile>>>,
        fail: Rc<Cell<bool>>,
        defer: Rc<Cell<bool>>,
        pending: Rc<RefCell<Vec<Completion<Tile>>>>,
    }

    impl Backend<TestAsset> for TestBackend {
        type Texture = Tile;

        fn create_texture(
            &mut self,
            tile: Tile,
            _asset: &TestAsset,
            completion: Completion<Tile>,
        ) -> CancelHandle {
            if self.defer.get() {
                self.created.set(self.created.get() + 1);
                self.pending.borrow_mut().push(completion);
            } else if self.fail.get() {
                completion.fail(LoadError::Texture("out of memory".into()));
            } else {
                self.created.set(self.created.get() + 1);
                if let Some(texture) = completion.succeed(tile) {
                    self.destroyed.borrow_mut().push(texture);
                }
            }
            CancelHandle::noop()
        }

        fn refresh_texture(&mut self, tile: Tile, _texture: &mut Tile, _asset: &TestAsset) {
            self.refreshed.borrow_mut().push(tile);
        }

        fn destroy_texture(&mut self, _tile: Tile, texture: Tile) {
            self.destroyed.borrow_mut().push(texture);
        }
    }

    type TestStore = TextureStore<ManualSource, TestBackend>;

    fn options(budget_tiles: u64, retain_frames: u32, strategy: EvictionStrategy) -> StoreOptions {
        StoreOptions {
            retain_frames,
            policy: LodPolicy {
                max_gpu_mb: (budget_tiles * TILE_BYTES) as f64 / (1024.0 * 1024.0),
                prefetch_ahead: 0,
                eviction_strategy: strategy,
            },
        }
    }

    fn store(options: StoreOptions) -> (TestStore, ManualSource, TestBackend) {
        let source = ManualSource::default();
        let backend = TestBackend::default();
        let store = TextureStore::new(source.clone(), backend.clone(), options);
        (store, source, backend)
    }

    fn record_events(store: &mut TestStore) -> Rc<RefCell<Vec<StoreEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store
            .events()
            .subscribe(move |event| sink.borrow_mut().push(event.clone()));
        events
    }

    /// Run one frame marking `tiles`, resolving their loads mid-frame.
    fn frame(store: &mut TestStore, source: &ManualSource, tiles: &[Tile]) {
        store.start_frame();
        for &tile in tiles {
            store.mark_tile(tile);
        }
        source.resolve_all();
        store.end_frame();
    }

    fn tile(x: u32) -> Tile {
        Tile::new(x, 0, 1)
    }

    #[test]
    fn test_mark_loads_and_creates_texture() {
        let (mut store, source, backend) = store(StoreOptions::default());
        let events = record_events(&mut store);

        store.start_frame();
        store.mark_tile(tile(0));
        assert_eq!(source.requests.get(), 1);
        assert_eq!(store.query(tile(0)).unwrap().status, LoadStatus::Loading);
        assert!(store.texture(tile(0)).is_none());

        assert!(source.resolve(tile(0), Ok(TestAsset::fixed())));
        store.poll();
        assert_eq!(store.texture(tile(0)), Some(&tile(0)));
        assert_eq!(backend.created.get(), 1);

        let state = store.query(tile(0)).unwrap();
        assert!(state.has_texture());
        assert!(state.visible);
        assert_eq!(state.bytes, TILE_BYTES);
        assert_eq!(store.stats().resident_bytes, TILE_BYTES);
        assert_eq!(
            *events.borrow(),
            vec![StoreEvent::StartLoad(tile(0)), StoreEvent::Load(tile(0))]
        );
    }

    #[test]
    fn test_marking_again_does_not_reload() {
        let (mut store, source, _) = store(StoreOptions::default());
        frame(&mut store, &source, &[tile(0)]);
        frame(&mut store, &source, &[tile(0)]);
        frame(&mut store, &source, &[tile(0)]);
        assert_eq!(source.requests.get(), 1);

        let stats = store.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(store.query(tile(0)).unwrap().last_seen_epoch, 3);

        store.reset_counters();
        assert_eq!(store.stats().hits, 0);
    }

    #[test]
    fn test_unmarked_in_flight_load_is_cancelled() {
        let (mut store, source, _) = store(StoreOptions::default());
        let events = record_events(&mut store);

        store.start_frame();
        store.mark_tile(tile(0));
        store.end_frame();

        store.start_frame();
        store.end_frame();

        assert_eq!(*source.cancelled.borrow(), vec![tile(0)]);
        assert!(store.query(tile(0)).is_none());
        assert_eq!(store.stats().cancellations, 1);

        // The completion can no longer be delivered.
        assert!(!source.resolve(tile(0), Ok(TestAsset::fixed())));
        store.poll();
        assert!(store.texture(tile(0)).is_none());
        assert!(!events.borrow().contains(&StoreEvent::Load(tile(0))));
        assert!(events.borrow().contains(&StoreEvent::Cancel(tile(0))));
    }

    #[test]
    fn test_external_cancel_then_mark_restarts_load() {
        let (mut store, source, _) = store(StoreOptions::default());
        store.start_frame();
        store.mark_tile(tile(0));
        assert!(store.cancel(tile(0)));
        assert!(!store.cancel(tile(0)));
        assert_eq!(store.query(tile(0)).unwrap().status, LoadStatus::Idle);

        // The old completion is suppressed; a new mark starts a fresh load.
        assert!(!source.resolve(tile(0), Ok(TestAsset::fixed())));
        store.mark_tile(tile(0));
        assert_eq!(source.requests.get(), 2);
        assert!(source.resolve(tile(0), Ok(TestAsset::fixed())));
        store.end_frame();
        assert!(store.texture(tile(0)).is_some());
    }

    #[test]
    fn test_failed_load_retried_once_per_frame() {
        let (mut store, source, _) = store(StoreOptions::default());
        let events = record_events(&mut store);

        store.start_frame();
        store.mark_tile(tile(0));
        source.resolve(tile(0), Err(LoadError::NotFound("0.png".into())));
        store.poll();
        assert_eq!(store.query(tile(0)).unwrap().status, LoadStatus::Failed);

        // Same frame: no retry.
        store.mark_tile(tile(0));
        store.mark_tile(tile(0));
        assert_eq!(source.requests.get(), 1);
        store.end_frame();
        assert!(store.query(tile(0)).is_some());

        // Next frame: exactly one retry.
        store.start_frame();
        store.mark_tile(tile(0));
        store.mark_tile(tile(0));
        assert_eq!(source.requests.get(), 2);
        source.resolve(tile(0), Ok(TestAsset::fixed()));
        store.end_frame();

        assert!(store.texture(tile(0)).is_some());
        assert_eq!(store.stats().load_errors, 1);
        assert!(events.borrow().contains(&StoreEvent::Error(
            tile(0),
            LoadError::NotFound("0.png".into())
        )));
    }

    #[test]
    fn test_failed_unmarked_entry_is_dropped() {
        let (mut store, source, _) = store(StoreOptions::default());
        store.start_frame();
        store.mark_tile(tile(0));
        source.resolve(tile(0), Err(LoadError::Io("denied".into())));
        store.end_frame();

        store.start_frame();
        store.end_frame();
        assert!(store.query(tile(0)).is_none());
    }

    #[test]
    fn test_texture_creation_failure_marks_entry_failed() {
        let (mut store, source, backend) = store(StoreOptions::default());
        backend.fail.set(true);
        frame(&mut store, &source, &[tile(0)]);
        assert_eq!(store.query(tile(0)).unwrap().status, LoadStatus::Failed);
        assert_eq!(store.stats().resident_bytes, 0);

        backend.fail.set(false);
        frame(&mut store, &source, &[tile(0)]);
        assert!(store.texture(tile(0)).is_some());
    }

    #[test]
    fn test_lru_eviction_keeps_budget() {
        let (mut store, source, backend) = store(options(2, 100, EvictionStrategy::Lru));
        frame(&mut store, &source, &[tile(0)]);
        frame(&mut store, &source, &[tile(1)]);
        frame(&mut store, &source, &[tile(2)]);

        // Three textures do not fit in two; the oldest goes.
        assert_eq!(*backend.destroyed.borrow(), vec![tile(0)]);
        assert!(store.texture(tile(1)).is_some());
        assert!(store.texture(tile(2)).is_some());
        let stats = store.stats();
        assert_eq!(stats.resident_bytes, 2 * TILE_BYTES);
        assert!(!stats.over_budget);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn test_visible_tiles_are_never_evicted() {
        let (mut store, source, _) = store(options(1, 100, EvictionStrategy::Lru));
        frame(&mut store, &source, &[tile(0), tile(1), tile(2)]);

        assert_eq!(store.stats().loaded, 3);
        assert!(store.stats().over_budget);

        frame(&mut store, &source, &[tile(2)]);
        assert_eq!(store.stats().loaded, 1);
        assert!(!store.stats().over_budget);
    }

    #[test]
    fn test_pinned_entries_survive_budget_pressure() {
        let (mut store, source, backend) = store(options(0, 0, EvictionStrategy::Lru));
        assert_eq!(store.pin(tile(0)), 1);
        assert_eq!(store.pin(tile(0)), 2);
        frame(&mut store, &source, &[]);
        frame(&mut store, &source, &[]);

        assert!(store.texture(tile(0)).is_some());
        assert!(backend.destroyed.borrow().is_empty());
        let stats = store.stats();
        assert!(stats.over_budget);
        assert_eq!(stats.pinned, 1);

        assert_eq!(store.unpin(tile(0)).unwrap(), 1);
        assert_eq!(store.unpin(tile(0)).unwrap(), 0);
        assert!(matches!(store.unpin(tile(0)), Err(StoreError::NotPinned(_))));
        frame(&mut store, &source, &[]);
        assert!(store.query(tile(0)).is_none());
        assert!(!store.stats().over_budget);
    }

    #[test]
    fn test_unpin_unknown_tile_fails() {
        let (mut store, _, _) = store(StoreOptions::default());
        assert!(matches!(store.unpin(tile(5)), Err(StoreError::NotPinned(t)) if t == tile(5)));
    }

    #[test]
    fn test_retain_frames_expire_textures() {
        let (mut store, source, backend) = store(options(100, 2, EvictionStrategy::Lru));
        frame(&mut store, &source, &[tile(0)]);
        frame(&mut store, &source, &[]);
        frame(&mut store, &source, &[]);
        assert!(store.texture(tile(0)).is_some());

        frame(&mut store, &source, &[]);
        assert!(store.query(tile(0)).is_none());
        assert_eq!(*backend.destroyed.borrow(), vec![tile(0)]);
        assert_eq!(store.stats().resident_bytes, 0);
    }

    #[test]
    fn test_late_completion_is_cached_and_evictable() {
        let (mut store, source, _) = store(options(0, 100, EvictionStrategy::Lru));
        store.start_frame();
        store.mark_tile(tile(0));
        store.end_frame();

        // Completes between frames, then the tile is no longer wanted.
        source.resolve(tile(0), Ok(TestAsset::fixed()));
        store.start_frame();
        assert!(store.texture(tile(0)).is_some());
        assert!(!store.query(tile(0)).unwrap().visible);
        store.end_frame();
        assert!(store.query(tile(0)).is_none());
    }

    #[test]
    fn test_distance_eviction_prefers_far_tiles() {
        let (mut store, source, backend) = store(options(1, 100, EvictionStrategy::Distance));
        store.set_locator(Box::new(|tile: Tile| {
            if tile.x == 0 { DVec3::Z } else { DVec3::X }
        }));
        store.set_focus(DVec3::NEG_Z);
        frame(&mut store, &source, &[tile(0), tile(1)]);
        frame(&mut store, &source, &[]);

        // tile 0 sits behind the viewer.
        assert_eq!(*backend.destroyed.borrow(), vec![tile(0)]);
        assert!(store.texture(tile(1)).is_some());
    }

    #[test]
    fn test_set_policy_applies_at_next_sweep() {
        let (mut store, source, _) = store(options(10, 100, EvictionStrategy::Lru));
        frame(&mut store, &source, &[tile(0), tile(1), tile(2)]);
        assert_eq!(store.stats().loaded, 3);

        store.set_policy(options(1, 100, EvictionStrategy::Lru).policy);
        assert_eq!(store.stats().budget_bytes, TILE_BYTES);
        frame(&mut store, &source, &[]);
        assert_eq!(store.stats().loaded, 1);
    }

    #[test]
    fn test_dynamic_asset_refreshes_texture() {
        let (mut store, source, backend) = store(StoreOptions::default());
        let events = record_events(&mut store);
        let version = Arc::new(AtomicU64::new(0));

        store.start_frame();
        store.mark_tile(tile(0));
        source.resolve(
            tile(0),
            Ok(TestAsset {
                size: 64,
                version: Some(Arc::clone(&version)),
            }),
        );
        store.end_frame();

        frame(&mut store, &source, &[tile(0)]);
        assert!(backend.refreshed.borrow().is_empty());

        version.store(1, Ordering::SeqCst);
        frame(&mut store, &source, &[tile(0)]);
        frame(&mut store, &source, &[tile(0)]);
        assert_eq!(*backend.refreshed.borrow(), vec![tile(0)]);
        assert!(events.borrow().contains(&StoreEvent::Invalid(tile(0))));
    }

    #[test]
    fn test_clear_releases_everything() {
        let (mut store, source, backend) = store(StoreOptions::default());
        store.pin(tile(9));
        frame(&mut store, &source, &[tile(0), tile(1)]);
        store.start_frame();
        store.mark_tile(tile(2));

        store.clear_not_pinned();
        assert_eq!(store.len(), 1);
        assert_eq!(*source.cancelled.borrow(), vec![tile(2)]);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.stats().resident_bytes, 0);
        assert_eq!(backend.destroyed.borrow().len(), 3);
    }

    #[test]
    fn test_drop_destroys_textures_and_cancels_loads() {
        let (mut store, source, backend) = store(StoreOptions::default());
        frame(&mut store, &source, &[tile(0)]);
        store.start_frame();
        store.mark_tile(tile(0));
        store.mark_tile(tile(1));
        drop(store);

        assert_eq!(*backend.destroyed.borrow(), vec![tile(0)]);
        assert_eq!(*source.cancelled.borrow(), vec![tile(1)]);
        assert!(!source.resolve(tile(1), Ok(TestAsset::fixed())));
    }

    #[test]
    fn test_drop_destroys_delivered_textures() {
        let (mut store, source, backend) = store(StoreOptions::default());
        backend.defer.set(true);
        store.start_frame();
        store.mark_tile(tile(0));
        assert!(source.resolve(tile(0), Ok(TestAsset::fixed())));
        store.poll();

        // Delivered, but the store never takes it in.
        let completion = backend.pending.borrow_mut().pop().unwrap();
        assert_eq!(completion.succeed(tile(0)), None);
        drop(store);

        assert_eq!(backend.created.get(), 1);
        assert_eq!(*backend.destroyed.borrow(), vec![tile(0)]);
    }

    #[test]
    fn test_cancelled_texture_is_handed_back() {
        let (mut store, source, backend) = store(StoreOptions::default());
        backend.defer.set(true);
        store.start_frame();
        store.mark_tile(tile(0));
        assert!(source.resolve(tile(0), Ok(TestAsset::fixed())));
        store.end_frame();
        assert_eq!(store.query(tile(0)).unwrap().status, LoadStatus::Loading);

        store.start_frame();
        store.end_frame();
        assert!(store.query(tile(0)).is_none());

        let completion = backend.pending.borrow_mut().pop().unwrap();
        assert!(completion.is_cancelled());
        assert_eq!(completion.succeed(tile(0)), Some(tile(0)));
        store.poll();
        assert_eq!(store.stats().resident_bytes, 0);
    }

    #[test]
    fn test_pin_retries_failed_load_next_frame() {
        let (mut store, source, _) = store(StoreOptions::default());
        store.start_frame();
        assert_eq!(store.pin(tile(0)), 1);
        assert!(source.resolve(tile(0), Err(LoadError::NotFound("0/0".into()))));
        store.end_frame();
        assert_eq!(store.query(tile(0)).unwrap().status, LoadStatus::Failed);

        store.pin(tile(0));
        assert_eq!(source.requests.get(), 1);

        store.start_frame();
        store.end_frame();
        assert_eq!(store.pin(tile(0)), 3);
        assert_eq!(source.requests.get(), 2);
        assert_eq!(store.query(tile(0)).unwrap().status, LoadStatus::Loading);
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.store.retain_frames = 5;
        config.lod.max_gpu_mb = 64.0;
        let options = StoreOptions::from_config(&config);
        assert_eq!(options.retain_frames, 5);
        assert_eq!(options.policy.max_gpu_bytes(), 64 * 1024 * 1024);
    }
}
