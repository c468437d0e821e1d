use std::sync::Arc;

use parking_lot::Mutex;

use crate::batch::{BatchReport, TourOp};
use crate::graph::PanoramaGraph;

/// Cloneable handle to a graph shared between threads.
///
/// Each `read`/`update` call holds the lock for the whole closure, so a
/// multi-step operation (link plus hotspot) is never observed half-done.
/// Background work (image fetches, saves) must come back through `update`
/// rather than holding a reference to the graph.
#[derive(Debug, Clone, Default)]
pub struct SharedTour {
    inner: Arc<Mutex<PanoramaGraph>>,
}

impl SharedTour {
    pub fn new(graph: PanoramaGraph) -> Self {
        Self {
            inner: Arc::new(Mutex::new(graph)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&PanoramaGraph) -> R) -> R {
        f(&self.inner.lock())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut PanoramaGraph) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn apply_batch(&self, ops: impl IntoIterator<Item = TourOp>) -> BatchReport {
        self.update(|g| g.apply_batch(ops))
    }

    pub fn revision(&self) -> u64 {
        self.read(PanoramaGraph::revision)
    }
}
