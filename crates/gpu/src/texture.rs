//! GPU texture lifecycle.
//!
//! [`TextureManager`] owns every texture the engine creates. GL work (upload,
//! delete) always goes through the [`GlTaskQueue`], so textures can be created,
//! updated and released from anywhere.
//!
//! URL loads are cached by URL and de-duplicated while in flight: concurrent
//! [`TextureManager::load_texture`] calls for one URL share a single fetch,
//! a single upload and a single result.
//!
//! [`TextureManager::destroy`] aborts loads still in flight, so their futures
//! settle even when the fetch never does.
//!
//! Each entry carries an epoch. An upload task captures the epoch it was
//! scheduled for and does nothing if the entry has been updated or released
//! since.

use crate::backend::GlBackend;
use crate::error::{GpuError, TextureError};
use crate::fetch::ImageFetcher;
use crate::image::decode_image;
use crate::tasks::GlTaskQueue;
use common::PixelBuffer;
use futures::channel::oneshot;
use futures::future::{self, AbortHandle, AbortRegistration, Abortable, FutureExt, LocalBoxFuture, Shared};
use slotmap::{new_key_type, SlotMap};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, warn};

new_key_type! {
    /// Handle to a managed texture.
    pub struct TextureKey;
}

/// Size and handle of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub key: TextureKey,
    pub width: u32,
    pub height: u32,
}

/// A pending or finished URL load. Clones share one underlying load.
pub type TextureLoad = Shared<LocalBoxFuture<'static, Result<TextureInfo, TextureError>>>;

#[derive(Debug)]
enum TextureState<T> {
    Pending,
    Ready(T),
}

#[derive(Debug)]
struct TextureEntry<T> {
    state: TextureState<T>,
    width: u32,
    height: u32,
    epoch: u64,
    url: Option<String>,
}

impl<T: Copy> TextureEntry<T> {
    fn texture(&self) -> Option<T> {
        match self.state {
            TextureState::Ready(t) => Some(t),
            TextureState::Pending => None,
        }
    }
}

struct InFlight {
    load: TextureLoad,
    abort: AbortHandle,
}

struct TextureStore<T> {
    entries: SlotMap<TextureKey, TextureEntry<T>>,
    by_url: HashMap<String, TextureKey>,
    in_flight: HashMap<String, InFlight>,
    destroyed: bool,
}

enum UploadOutcome {
    Uploaded(TextureInfo),
    Stale,
    Failed(GpuError),
}

/// Texture cache and uploader.
pub struct TextureManager<B: GlBackend> {
    store: Rc<RefCell<TextureStore<B::Texture>>>,
    tasks: Rc<GlTaskQueue<B>>,
    fetcher: Rc<dyn ImageFetcher>,
}

impl<B: GlBackend> TextureManager<B> {
    pub fn new(tasks: Rc<GlTaskQueue<B>>, fetcher: Rc<dyn ImageFetcher>) -> Self {
        Self {
            store: Rc::new(RefCell::new(TextureStore {
                entries: SlotMap::with_key(),
                by_url: HashMap::new(),
                in_flight: HashMap::new(),
                destroyed: false,
            })),
            tasks,
            fetcher,
        }
    }

    /// Load `url` into a texture.
    ///
    /// Returns at once with a ready future for cached URLs and with a clone of
    /// the pending future for URLs already loading. The future resolves after
    /// the GPU upload has run, so the texture is usable as soon as it does.
    /// On failure the entry is dropped and a later call retries.
    pub fn load_texture(&self, url: &str) -> TextureLoad {
        let mut store = self.store.borrow_mut();
        if store.destroyed {
            let err = TextureError::Destroyed { url: url.to_string() };
            return future::ready(Err(err)).boxed_local().shared();
        }

        if let Some(&key) = store.by_url.get(url) {
            if let Some(entry) = store.entries.get(key) {
                if let TextureState::Ready(_) = entry.state {
                    let info = TextureInfo { key, width: entry.width, height: entry.height };
                    return future::ready(Ok(info)).boxed_local().shared();
                }
            }
        }

        if let Some(in_flight) = store.in_flight.get(url) {
            debug!(url, "joining in-flight texture load");
            return in_flight.load.clone();
        }

        let key = store.entries.insert(TextureEntry {
            state: TextureState::Pending,
            width: 0,
            height: 0,
            epoch: 0,
            url: Some(url.to_string()),
        });
        store.by_url.insert(url.to_string(), key);

        debug!(url, "starting texture load");
        let fetch = self.fetcher.fetch(url);
        let (abort, registration) = AbortHandle::new_pair();
        let load = load_url(
            Rc::clone(&self.store),
            Rc::clone(&self.tasks),
            fetch,
            registration,
            key,
            url.to_string(),
        )
        .boxed_local()
        .shared();
        store
            .in_flight
            .insert(url.to_string(), InFlight { load: load.clone(), abort });
        load
    }

    /// Create a texture owned by the caller from CPU pixels. The upload is
    /// deferred like any GL work; the key is valid immediately.
    pub fn create_texture(&self, pixels: PixelBuffer) -> TextureKey {
        let key = self.store.borrow_mut().entries.insert(TextureEntry {
            state: TextureState::Pending,
            width: pixels.width,
            height: pixels.height,
            epoch: 0,
            url: None,
        });
        self.schedule_upload(key, 0, pixels);
        key
    }

    /// Replace the contents of a texture. Any upload still pending for the
    /// previous contents is skipped. Returns `false` for unknown keys.
    pub fn update_texture(&self, key: TextureKey, pixels: PixelBuffer) -> bool {
        let epoch = {
            let mut store = self.store.borrow_mut();
            let Some(entry) = store.entries.get_mut(key) else {
                return false;
            };
            entry.epoch += 1;
            entry.width = pixels.width;
            entry.height = pixels.height;
            entry.epoch
        };
        self.schedule_upload(key, epoch, pixels);
        true
    }

    /// Forget a texture and queue the GL delete. Pending uploads for it become
    /// no-ops. Returns `false` for unknown keys.
    pub fn release(&self, key: TextureKey) -> bool {
        let entry = {
            let mut store = self.store.borrow_mut();
            let Some(entry) = store.entries.remove(key) else {
                return false;
            };
            if let Some(url) = &entry.url {
                if store.by_url.get(url) == Some(&key) {
                    store.by_url.remove(url);
                }
            }
            entry
        };
        if let Some(texture) = entry.texture() {
            self.tasks.schedule(Box::new(move |gl: &B| {
                gl.delete_texture(texture);
                Ok(())
            }));
        }
        true
    }

    /// Stop accepting loads, abort pending ones and queue deletes for every
    /// texture. The caller drains the task queue afterwards.
    ///
    /// Aborted loads resolve with [`TextureError::Destroyed`] the next time
    /// they are polled, whether they were waiting on the fetch or the upload.
    pub fn destroy(&self) {
        let (textures, in_flight) = {
            let mut store = self.store.borrow_mut();
            store.destroyed = true;
            store.by_url.clear();
            let textures: Vec<B::Texture> = store.entries.drain().filter_map(|(_, e)| e.texture()).collect();
            (textures, std::mem::take(&mut store.in_flight))
        };
        for (url, load) in in_flight {
            debug!(url = %url, "aborting texture load");
            load.abort.abort();
        }
        debug!(count = textures.len(), "releasing all textures");
        if textures.is_empty() {
            return;
        }
        self.tasks.schedule(Box::new(move |gl: &B| {
            for texture in textures {
                gl.delete_texture(texture);
            }
            Ok(())
        }));
    }

    pub fn is_destroyed(&self) -> bool {
        self.store.borrow().destroyed
    }

    /// GL handle, once uploaded.
    pub fn texture(&self, key: TextureKey) -> Option<B::Texture> {
        self.store.borrow().entries.get(key).and_then(TextureEntry::texture)
    }

    pub fn info(&self, key: TextureKey) -> Option<TextureInfo> {
        self.store
            .borrow()
            .entries
            .get(key)
            .map(|e| TextureInfo { key, width: e.width, height: e.height })
    }

    pub fn is_ready(&self, key: TextureKey) -> bool {
        self.texture(key).is_some()
    }

    pub fn key_for_url(&self, url: &str) -> Option<TextureKey> {
        self.store.borrow().by_url.get(url).copied()
    }

    pub fn in_flight(&self) -> usize {
        self.store.borrow().in_flight.len()
    }

    pub fn len(&self) -> usize {
        self.store.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn schedule_upload(&self, key: TextureKey, epoch: u64, pixels: PixelBuffer) {
        let store = Rc::clone(&self.store);
        self.tasks.schedule(Box::new(move |gl: &B| {
            match upload_entry(gl, &store, key, epoch, &pixels) {
                UploadOutcome::Uploaded(_) => Ok(()),
                UploadOutcome::Stale => {
                    debug!(?key, epoch, "skipping stale texture upload");
                    Ok(())
                }
                UploadOutcome::Failed(e) => Err(e),
            }
        }));
    }
}

async fn load_url<B: GlBackend>(
    store: Rc<RefCell<TextureStore<B::Texture>>>,
    tasks: Rc<GlTaskQueue<B>>,
    fetch: LocalBoxFuture<'static, Result<Vec<u8>, String>>,
    registration: AbortRegistration,
    key: TextureKey,
    url: String,
) -> Result<TextureInfo, TextureError> {
    let result = Abortable::new(fetch_and_upload(&store, &tasks, fetch, key, &url), registration)
        .await
        .unwrap_or_else(|_| Err(TextureError::Destroyed { url: url.clone() }));

    let mut s = store.borrow_mut();
    s.in_flight.remove(&url);
    match &result {
        Ok(info) => debug!(url = %url, width = info.width, height = info.height, "texture loaded"),
        Err(e) => {
            warn!(url = %url, error = %e, "texture load failed");
            if s.by_url.get(&url) == Some(&key) {
                s.by_url.remove(&url);
            }
            s.entries.remove(key);
        }
    }
    result
}

async fn fetch_and_upload<B: GlBackend>(
    store: &Rc<RefCell<TextureStore<B::Texture>>>,
    tasks: &Rc<GlTaskQueue<B>>,
    fetch: LocalBoxFuture<'static, Result<Vec<u8>, String>>,
    key: TextureKey,
    url: &str,
) -> Result<TextureInfo, TextureError> {
    let destroyed = || TextureError::Destroyed { url: url.to_string() };

    let bytes = fetch.await.map_err(|message| TextureError::Fetch {
        url: url.to_string(),
        message,
    })?;
    if store.borrow().destroyed {
        return Err(destroyed());
    }

    let pixels = decode_image(&bytes).map_err(|message| TextureError::Decode {
        url: url.to_string(),
        message,
    })?;

    let epoch = {
        let mut s = store.borrow_mut();
        let entry = s.entries.get_mut(key).ok_or_else(destroyed)?;
        entry.width = pixels.width;
        entry.height = pixels.height;
        entry.epoch
    };

    let (tx, rx) = oneshot::channel();
    let task_store = Rc::clone(store);
    let task_url = url.to_string();
    tasks.schedule(Box::new(move |gl: &B| {
        let result = match upload_entry(gl, &task_store, key, epoch, &pixels) {
            UploadOutcome::Uploaded(info) => Ok(info),
            UploadOutcome::Stale => Err(TextureError::Destroyed { url: task_url }),
            UploadOutcome::Failed(e) => Err(TextureError::Upload {
                url: task_url,
                message: e.to_string(),
            }),
        };
        // the waiter may have been dropped
        let _ = tx.send(result);
        Ok(())
    }));

    // a dropped sender means the task was discarded without running
    rx.await.unwrap_or_else(|_| Err(destroyed()))
}

fn upload_entry<B: GlBackend>(
    gl: &B,
    store: &RefCell<TextureStore<B::Texture>>,
    key: TextureKey,
    epoch: u64,
    pixels: &PixelBuffer,
) -> UploadOutcome {
    let existing = {
        let s = store.borrow();
        if s.destroyed {
            return UploadOutcome::Stale;
        }
        match s.entries.get(key) {
            Some(entry) if entry.epoch == epoch => entry.texture(),
            _ => return UploadOutcome::Stale,
        }
    };

    match upload_pixels(gl, existing, pixels) {
        Ok(texture) => {
            if let Some(entry) = store.borrow_mut().entries.get_mut(key) {
                entry.state = TextureState::Ready(texture);
            }
            UploadOutcome::Uploaded(TextureInfo {
                key,
                width: pixels.width,
                height: pixels.height,
            })
        }
        Err(e) => UploadOutcome::Failed(e),
    }
}

/// Upload RGBA pixels into `existing` or a new texture on unit 0.
///
/// Power-of-two images get mipmaps and trilinear filtering. Other sizes are
/// clamped to edge with linear filtering and no mipmaps.
pub fn upload_pixels<B: GlBackend>(
    gl: &B,
    existing: Option<B::Texture>,
    pixels: &PixelBuffer,
) -> Result<B::Texture, GpuError> {
    let texture = match existing {
        Some(t) => t,
        None => gl.create_texture().map_err(GpuError::Resource)?,
    };

    gl.active_texture(glow::TEXTURE0);
    gl.bind_texture(glow::TEXTURE_2D, Some(texture));
    gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
    gl.tex_image_2d(
        glow::TEXTURE_2D,
        0,
        glow::RGBA as i32,
        pixels.width as i32,
        pixels.height as i32,
        0,
        glow::RGBA,
        glow::UNSIGNED_BYTE,
        Some(pixels.as_bytes()),
    );

    if pixels.width.is_power_of_two() && pixels.height.is_power_of_two() {
        gl.generate_mipmap(glow::TEXTURE_2D);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR_MIPMAP_LINEAR as i32);
    } else {
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
    }
    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);

    Ok(texture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessGl;
    use crate::image::encode_png;
    use futures::executor::LocalPool;
    use futures::task::LocalSpawnExt;
    use std::cell::Cell;

    struct CountingFetcher {
        response: Result<Vec<u8>, String>,
        calls: Cell<usize>,
    }

    impl ImageFetcher for CountingFetcher {
        fn fetch(&self, _source: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, String>> {
            self.calls.set(self.calls.get() + 1);
            future::ready(self.response.clone()).boxed_local()
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&PixelBuffer::new(width, height)).unwrap()
    }

    struct Fixture {
        gl: Rc<HeadlessGl>,
        tasks: Rc<GlTaskQueue<HeadlessGl>>,
        fetcher: Rc<CountingFetcher>,
        textures: TextureManager<HeadlessGl>,
    }

    fn fixture(response: Result<Vec<u8>, String>) -> Fixture {
        let gl = Rc::new(HeadlessGl::default());
        let tasks = GlTaskQueue::new(gl.clone());
        let fetcher = Rc::new(CountingFetcher { response, calls: Cell::new(0) });
        let textures = TextureManager::new(tasks.clone(), fetcher.clone());
        Fixture { gl, tasks, fetcher, textures }
    }

    fn flush(tasks: &Rc<GlTaskQueue<HeadlessGl>>) {
        let _guard = tasks.enter_safe_section();
        tasks.flush();
    }

    type Slot = Rc<RefCell<Option<Result<TextureInfo, TextureError>>>>;

    fn spawn_load(pool: &LocalPool, load: TextureLoad) -> Slot {
        let slot: Slot = Rc::new(RefCell::new(None));
        let out = slot.clone();
        pool.spawner()
            .spawn_local(async move {
                *out.borrow_mut() = Some(load.await);
            })
            .unwrap();
        slot
    }

    #[test]
    fn test_concurrent_loads_share_one_fetch_and_upload() {
        let f = fixture(Ok(png(4, 4)));
        let mut pool = LocalPool::new();

        let a = spawn_load(&pool, f.textures.load_texture("img.png"));
        let b = spawn_load(&pool, f.textures.load_texture("img.png"));
        pool.run_until_stalled();

        // decoded, upload waiting for the next render
        assert!(a.borrow().is_none());
        assert_eq!(f.tasks.pending(), 1);

        flush(&f.tasks);
        pool.run_until_stalled();

        let a = a.borrow().clone().unwrap().unwrap();
        let b = b.borrow().clone().unwrap().unwrap();
        assert_eq!(a.key, b.key);
        assert_eq!((a.width, a.height), (4, 4));
        assert_eq!(f.fetcher.calls.get(), 1);
        assert_eq!(f.gl.stats().texture_uploads, 1);
        assert!(f.textures.is_ready(a.key));
        assert_eq!(f.textures.in_flight(), 0);

        // cached afterwards
        let c = spawn_load(&pool, f.textures.load_texture("img.png"));
        pool.run_until_stalled();
        assert_eq!(c.borrow().clone().unwrap().unwrap().key, a.key);
        assert_eq!(f.fetcher.calls.get(), 1);
    }

    #[test]
    fn test_failed_load_allows_retry() {
        let f = fixture(Err("404".to_string()));
        let mut pool = LocalPool::new();

        let first = spawn_load(&pool, f.textures.load_texture("missing.png"));
        pool.run_until_stalled();
        let err = first.borrow().clone().unwrap().unwrap_err();
        assert!(matches!(err, TextureError::Fetch { .. }));
        assert_eq!(f.textures.in_flight(), 0);
        assert!(f.textures.key_for_url("missing.png").is_none());

        let _second = spawn_load(&pool, f.textures.load_texture("missing.png"));
        pool.run_until_stalled();
        assert_eq!(f.fetcher.calls.get(), 2);
    }

    #[test]
    fn test_decode_failure_is_reported() {
        let f = fixture(Ok(b"not an image".to_vec()));
        let mut pool = LocalPool::new();
        let slot = spawn_load(&pool, f.textures.load_texture("bad.png"));
        pool.run_until_stalled();
        let err = slot.borrow().clone().unwrap().unwrap_err();
        assert!(matches!(err, TextureError::Decode { .. }));
        assert!(f.textures.is_empty());
    }

    #[test]
    fn test_destroy_rejects_pending_loads() {
        let f = fixture(Ok(png(2, 2)));
        let mut pool = LocalPool::new();
        let slot = spawn_load(&pool, f.textures.load_texture("a.png"));
        pool.run_until_stalled();

        f.textures.destroy();
        flush(&f.tasks);
        pool.run_until_stalled();

        let err = slot.borrow().clone().unwrap().unwrap_err();
        assert_eq!(err, TextureError::Destroyed { url: "a.png".to_string() });
        assert!(err.to_string().contains("destroyed while loading"));
        assert_eq!(f.gl.stats().texture_uploads, 0);

        let late = spawn_load(&pool, f.textures.load_texture("b.png"));
        pool.run_until_stalled();
        assert!(matches!(late.borrow().clone().unwrap(), Err(TextureError::Destroyed { .. })));
    }

    struct HangingFetcher;

    impl ImageFetcher for HangingFetcher {
        fn fetch(&self, _source: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, String>> {
            future::pending().boxed_local()
        }
    }

    #[test]
    fn test_destroy_settles_loads_whose_fetch_never_finishes() {
        let gl = Rc::new(HeadlessGl::default());
        let tasks = GlTaskQueue::new(gl.clone());
        let textures = TextureManager::new(tasks.clone(), Rc::new(HangingFetcher));
        let mut pool = LocalPool::new();
        let first = spawn_load(&pool, textures.load_texture("slow.png"));
        let second = spawn_load(&pool, textures.load_texture("slow.png"));
        pool.run_until_stalled();
        assert!(first.borrow().is_none());
        assert_eq!(textures.in_flight(), 1);

        textures.destroy();
        pool.run_until_stalled();
        for slot in [first, second] {
            let err = slot.borrow().clone().unwrap().unwrap_err();
            assert_eq!(err, TextureError::Destroyed { url: "slow.png".to_string() });
        }
        assert_eq!(textures.in_flight(), 0);
        assert!(textures.is_empty());
        flush(&tasks);
        assert_eq!(gl.stats().textures_created, 0);
    }

    #[test]
    fn test_power_of_two_gets_mipmaps() {
        let f = fixture(Err(String::new()));
        let _guard = f.tasks.enter_safe_section();

        let pot = f.textures.create_texture(PixelBuffer::new(8, 4));
        let npot = f.textures.create_texture(PixelBuffer::new(3, 5));

        let pot = f.gl.texture_record(f.textures.texture(pot).unwrap()).unwrap();
        assert!(pot.mipmapped);
        assert_eq!(pot.params[&glow::TEXTURE_MIN_FILTER], glow::LINEAR_MIPMAP_LINEAR as i32);

        let npot = f.gl.texture_record(f.textures.texture(npot).unwrap()).unwrap();
        assert!(!npot.mipmapped);
        assert_eq!(npot.params[&glow::TEXTURE_WRAP_S], glow::CLAMP_TO_EDGE as i32);
        assert_eq!(npot.params[&glow::TEXTURE_MIN_FILTER], glow::LINEAR as i32);
    }

    #[test]
    fn test_release_is_deferred() {
        let f = fixture(Err(String::new()));
        let key = {
            let _guard = f.tasks.enter_safe_section();
            f.textures.create_texture(PixelBuffer::new(2, 2))
        };
        assert_eq!(f.gl.live_textures(), 1);

        assert!(f.textures.release(key));
        assert!(!f.textures.release(key));
        assert_eq!(f.gl.live_textures(), 1);

        flush(&f.tasks);
        assert_eq!(f.gl.live_textures(), 0);
    }

    #[test]
    fn test_stale_updates_are_skipped() {
        let f = fixture(Err(String::new()));
        let key = {
            let _guard = f.tasks.enter_safe_section();
            f.textures.create_texture(PixelBuffer::new(2, 2))
        };
        f.textures.update_texture(key, PixelBuffer::new(3, 3));
        f.textures.update_texture(key, PixelBuffer::new(5, 5));
        flush(&f.tasks);

        assert_eq!(f.gl.stats().texture_uploads, 2);
        assert_eq!(f.gl.stats().textures_created, 1);
        let record = f.gl.texture_record(f.textures.texture(key).unwrap()).unwrap();
        assert_eq!((record.width, record.height), (5, 5));
    }

    #[test]
    fn test_release_before_upload_cancels_it() {
        let f = fixture(Err(String::new()));
        let key = f.textures.create_texture(PixelBuffer::new(2, 2));
        f.textures.release(key);
        flush(&f.tasks);
        assert_eq!(f.gl.stats().textures_created, 0);
    }
}
