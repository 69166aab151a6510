//! Background reduction for a single output surface.
//!
//! Every request bumps the surface generation. A reduction runs on the
//! blocking pool and is published only if no newer request arrived in the
//! meantime, so a slow reduction for stale data never overwrites a fresh one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use climagraph_core::Series;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::{reduce, KnownBounds, Reduction, ValueRange};

/// A published reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub generation: u64,
    pub pixel_width: usize,
    pub reduction: Reduction,
}

struct SurfaceState {
    generation: u64,
    data: Arc<Series>,
    pixel_width: usize,
    /// Bucket-mean bounds carried across resizes. The raw range is always
    /// recomputed from the data.
    observed: Option<ValueRange>,
}

struct SurfaceInner {
    state: Mutex<SurfaceState>,
    tx: watch::Sender<Option<Arc<Frame>>>,
}

/// Last-request-wins reduction surface.
///
/// Cloning is cheap; clones share state. Requests must be issued from inside
/// a tokio runtime.
#[derive(Clone)]
pub struct RenderSurface {
    inner: Arc<SurfaceInner>,
}

/// Handle to one scheduled reduction.
#[derive(Debug)]
pub struct RenderTicket {
    generation: u64,
    handle: JoinHandle<bool>,
}

impl RenderTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the reduction and report whether it was published.
    ///
    /// `false` means a newer request superseded it (or the task was lost).
    pub async fn applied(self) -> bool {
        self.handle.await.unwrap_or(false)
    }
}

impl RenderSurface {
    pub fn new(pixel_width: usize) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(SurfaceInner {
                state: Mutex::new(SurfaceState {
                    generation: 0,
                    data: Arc::new(Vec::new()),
                    pixel_width,
                    observed: None,
                }),
                tx,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SurfaceState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Receiver for published frames.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Frame>>> {
        self.inner.tx.subscribe()
    }

    /// Most recently published frame.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.inner.tx.borrow().clone()
    }

    pub fn pixel_width(&self) -> usize {
        self.state().pixel_width
    }

    /// Current generation; the last issued request carries this number.
    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    /// Replace the data. Axis bounds are recomputed from scratch.
    pub fn set_data(&self, data: Arc<Series>) -> RenderTicket {
        let mut state = self.state();
        state.data = data;
        state.observed = None;
        self.schedule(state)
    }

    /// Change the width and re-reduce, keeping the last observed bounds.
    pub fn resize(&self, pixel_width: usize) -> RenderTicket {
        let mut state = self.state();
        state.pixel_width = pixel_width;
        self.schedule(state)
    }

    fn schedule(&self, mut state: MutexGuard<'_, SurfaceState>) -> RenderTicket {
        state.generation += 1;
        let generation = state.generation;
        let data = Arc::clone(&state.data);
        let pixel_width = state.pixel_width;
        let carried = state.observed;
        drop(state);

        tracing::debug!(generation, pixel_width, samples = data.len(), "Scheduling reduction");

        let surface = self.clone();
        let handle = tokio::spawn(async move {
            let reduced = tokio::task::spawn_blocking(move || {
                let mut reduction = reduce(&data, pixel_width, KnownBounds::none());
                if carried.is_some() && !reduction.is_empty() {
                    reduction.observed = carried;
                }
                reduction
            })
            .await;
            match reduced {
                Ok(reduction) => surface.publish(Frame {
                    generation,
                    pixel_width,
                    reduction,
                }),
                Err(e) => {
                    tracing::warn!(generation, error = %e, "Reduction task failed");
                    false
                }
            }
        });

        RenderTicket { generation, handle }
    }

    fn publish(&self, frame: Frame) -> bool {
        let mut state = self.state();
        if frame.generation != state.generation {
            tracing::debug!(
                generation = frame.generation,
                current = state.generation,
                "Discarding stale reduction"
            );
            return false;
        }
        state.observed = frame.reduction.observed;
        self.inner.tx.send_replace(Some(Arc::new(frame)));
        true
    }
}
