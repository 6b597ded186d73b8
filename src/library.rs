//! Rendering library abstraction and its lazy, shared loader.
//!
//! A [`RenderLibrary`] is whatever parses PDF bytes and rasterizes pages.
//! The loader binds it at most once per loader instance; callers that show
//! up while a load is in flight wait for that same load instead of
//! starting another one.

use crate::surface::{Surface, Viewport};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Index of the page every conversion targets.
pub const FIRST_PAGE_INDEX: u16 = 0;

/// Errors raised by a rendering library or while loading it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LibraryError {
    #[error("Failed to load PDF library: {0}")]
    Bind(String),

    #[error("Failed to load PDF document: {0}")]
    Document(String),

    #[error("Page {index} is out of range (document has {count} pages)")]
    PageOutOfRange { index: u16, count: u16 },

    #[error("Failed to render page {index}: {message}")]
    Render { index: u16, message: String },

    #[error("PDF library load was abandoned before completing")]
    Abandoned,
}

/// Options used when opening a document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOptions {
    pub disable_worker: bool,
    pub is_eval_supported: bool,
    pub use_system_fonts: bool,
    pub password: Option<String>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        DocumentOptions {
            disable_worker: false,
            is_eval_supported: true,
            use_system_fonts: true,
            password: None,
        }
    }
}

/// Page dimensions in PDF points (1/72 inch), as displayed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Image smoothing applied while rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Smoothing {
    Disabled,
    #[default]
    High,
}

/// Options applied to a single page render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub smoothing: Smoothing,
}

/// A PDF rendering library.
pub trait RenderLibrary {
    type Document<'a>: RenderDocument
    where
        Self: 'a;

    /// Parses `data` into a document.
    fn open_document<'a>(
        &'a self,
        data: &'a [u8],
        options: &'a DocumentOptions,
    ) -> Result<Self::Document<'a>, LibraryError>;
}

/// A parsed document exposed by a [`RenderLibrary`].
pub trait RenderDocument {
    fn page_count(&self) -> u16;

    fn page_size(&self, index: u16) -> Result<PageSize, LibraryError>;

    /// Renders page `index` at `viewport` into `surface`.
    fn render_page(
        &self,
        index: u16,
        viewport: &Viewport,
        surface: &mut Surface,
        options: &RenderOptions,
    ) -> Result<(), LibraryError>;
}

type InitFn<L> = dyn Fn() -> Result<L, LibraryError> + Send + Sync;

enum LoadState<L> {
    Idle,
    Loading(Arc<Flight<L>>),
    Ready(Arc<L>),
}

/// One in-progress load, shared by the leader and every follower.
struct Flight<L> {
    outcome: Mutex<Option<Result<Arc<L>, LibraryError>>>,
    done: Condvar,
}

impl<L> Flight<L> {
    fn new() -> Self {
        Flight {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn complete(&self, result: Result<Arc<L>, LibraryError>) {
        let mut outcome = self.outcome.lock();
        if outcome.is_none() {
            *outcome = Some(result);
        }
        self.done.notify_all();
    }

    fn wait(&self) -> Result<Arc<L>, LibraryError> {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            self.done.wait(&mut outcome);
        }
    }
}

/// Resets the loader if the init closure unwinds.
struct FlightGuard<'a, L> {
    state: &'a Mutex<LoadState<L>>,
    flight: &'a Flight<L>,
    finished: bool,
}

impl<L> Drop for FlightGuard<'_, L> {
    fn drop(&mut self) {
        if !self.finished {
            *self.state.lock() = LoadState::Idle;
            self.flight.complete(Err(LibraryError::Abandoned));
        }
    }
}

/// Lazily binds a rendering library, once, on first use.
pub struct LibraryLoader<L> {
    init: Option<Box<InitFn<L>>>,
    state: Mutex<LoadState<L>>,
    loads: AtomicUsize,
}

impl<L> LibraryLoader<L> {
    /// Creates a loader that calls `init` to bind the library.
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> Result<L, LibraryError> + Send + Sync + 'static,
    {
        LibraryLoader {
            init: Some(Box::new(init)),
            state: Mutex::new(LoadState::Idle),
            loads: AtomicUsize::new(0),
        }
    }

    /// Creates a loader around an already bound library.
    pub fn ready(library: L) -> Self {
        LibraryLoader {
            init: None,
            state: Mutex::new(LoadState::Ready(Arc::new(library))),
            loads: AtomicUsize::new(0),
        }
    }

    /// Returns the shared library, loading it if needed.
    ///
    /// Concurrent callers during a load all receive that load's outcome.
    /// A failed load is not cached: the next call starts a fresh one.
    pub fn get(&self) -> Result<Arc<L>, LibraryError> {
        let mut state = self.state.lock();
        if let LoadState::Ready(library) = &*state {
            return Ok(Arc::clone(library));
        }
        if let LoadState::Loading(flight) = &*state {
            let flight = Arc::clone(flight);
            drop(state);
            tracing::debug!("PDF library load already in progress, waiting");
            return flight.wait();
        }

        let flight = Arc::new(Flight::new());
        *state = LoadState::Loading(Arc::clone(&flight));
        drop(state);

        let attempt = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(attempt, "loading PDF library");

        let mut guard = FlightGuard {
            state: &self.state,
            flight: &flight,
            finished: false,
        };
        let result = match &self.init {
            Some(init) => init().map(Arc::new),
            None => Err(LibraryError::Bind("no library loader configured".into())),
        };

        {
            let mut state = self.state.lock();
            *state = match &result {
                Ok(library) => LoadState::Ready(Arc::clone(library)),
                Err(_) => LoadState::Idle,
            };
        }
        guard.finished = true;

        match &result {
            Ok(_) => tracing::debug!("PDF library loaded successfully"),
            Err(e) => tracing::error!(error = %e, "Error loading PDF library"),
        }
        flight.complete(result.clone());
        result
    }

    /// Number of load sequences started so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*self.state.lock(), LoadState::Ready(_))
    }
}
