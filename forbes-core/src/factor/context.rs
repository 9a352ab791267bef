//! Scoped context for the sparse factorization backend.
//!
//! The context owns the backend's reusable workspace and its diagnostic
//! counters. Sparse solvers borrow it, so it cannot be finished while a
//! solver built on it is alive. It is single-threaded (`!Sync`); create one
//! per thread when needed.

use std::cell::{Cell, RefCell};
use std::mem::size_of;

use log::debug;

use crate::error::Result;
use crate::settings::LinalgSettings;

/// Backend workspaces, sized for the largest system seen so far.
pub(crate) struct Workspace {
    pub(crate) bwork: Vec<ldl::Marker>,
    pub(crate) iwork: Vec<usize>,
    pub(crate) fwork: Vec<f64>,
}

impl Workspace {
    fn with_dimension(n: usize) -> Self {
        Self {
            bwork: vec![ldl::Marker::Unused; n],
            iwork: vec![0; 3 * n],
            fwork: vec![0.0; n],
        }
    }

    fn bytes(&self) -> usize {
        self.bwork.len() * size_of::<ldl::Marker>()
            + self.iwork.len() * size_of::<usize>()
            + self.fwork.len() * size_of::<f64>()
    }

    /// Clean the first `n` entries of each buffer (the backend expects unused markers).
    fn reset(&mut self, n: usize) {
        self.bwork[..n].fill(ldl::Marker::Unused);
        self.iwork[..3 * n].fill(0);
        self.fwork[..n].fill(0.0);
    }
}

/// Handle for the sparse factorization backend.
pub struct SparseContext {
    settings: LinalgSettings,
    status: Cell<i32>,
    workspace_bytes: Cell<usize>,
    factor_bytes: Cell<usize>,
    peak_memory: Cell<usize>,
    factorizations: Cell<usize>,
    workspace: RefCell<Option<Workspace>>,
    finished: Cell<bool>,
}

impl SparseContext {
    /// Open a context. The workspace is allocated lazily by the first
    /// sparse factorization.
    pub fn new(settings: LinalgSettings) -> Result<Self> {
        settings.validate()?;
        debug!("sparse context opened");
        Ok(Self {
            settings,
            status: Cell::new(0),
            workspace_bytes: Cell::new(0),
            factor_bytes: Cell::new(0),
            peak_memory: Cell::new(0),
            factorizations: Cell::new(0),
            workspace: RefCell::new(None),
            finished: Cell::new(false),
        })
    }

    pub fn settings(&self) -> &LinalgSettings {
        &self.settings
    }

    /// Status of the last backend call; 0 means ok.
    pub fn status(&self) -> i32 {
        self.status.get()
    }

    /// Bytes currently held by the workspace and by live factors.
    pub fn memory_usage(&self) -> usize {
        self.workspace_bytes.get() + self.factor_bytes.get()
    }

    /// Largest `memory_usage` observed.
    pub fn peak_memory(&self) -> usize {
        self.peak_memory.get()
    }

    /// Number of numeric factorizations attempted through this context.
    pub fn factorizations(&self) -> usize {
        self.factorizations.get()
    }

    /// Release the workspace and close the context.
    ///
    /// Returns the last backend status.
    pub fn finish(self) -> i32 {
        self.release();
        self.status.get()
    }

    fn release(&self) {
        if self.finished.replace(true) {
            return;
        }
        self.workspace.borrow_mut().take();
        self.workspace_bytes.set(0);
        debug!(
            "sparse context closed: {} factorizations, peak memory {} bytes",
            self.factorizations.get(),
            self.peak_memory.get()
        );
    }

    fn update_peak(&self) {
        let now = self.memory_usage();
        if now > self.peak_memory.get() {
            self.peak_memory.set(now);
        }
    }

    pub(crate) fn set_status(&self, status: i32) {
        self.status.set(status);
    }

    /// Run `f` with a clean workspace of dimension at least `n`.
    pub(crate) fn with_workspace<T>(&self, n: usize, f: impl FnOnce(&mut Workspace) -> T) -> T {
        self.factorizations.set(self.factorizations.get() + 1);
        let mut slot = self.workspace.borrow_mut();
        if slot.as_ref().map_or(true, |ws| ws.fwork.len() < n) {
            let ws = Workspace::with_dimension(n);
            debug!("sparse workspace allocated for n = {} ({} bytes)", n, ws.bytes());
            self.workspace_bytes.set(ws.bytes());
            *slot = Some(ws);
            self.update_peak();
        }
        let ws = slot.get_or_insert_with(|| Workspace::with_dimension(n));
        ws.reset(n);
        f(ws)
    }

    pub(crate) fn track_factor(&self, bytes: usize) {
        self.factor_bytes.set(self.factor_bytes.get() + bytes);
        self.update_peak();
    }

    pub(crate) fn untrack_factor(&self, bytes: usize) {
        self.factor_bytes.set(self.factor_bytes.get().saturating_sub(bytes));
    }
}

impl Drop for SparseContext {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SparseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseContext")
            .field("status", &self.status())
            .field("memory_usage", &self.memory_usage())
            .field("factorizations", &self.factorizations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_workspace() {
        let ctx = SparseContext::new(LinalgSettings::default()).unwrap();
        assert_eq!(ctx.memory_usage(), 0);
        assert_eq!(ctx.status(), 0);

        let len = ctx.with_workspace(8, |ws| ws.iwork.len());
        assert_eq!(len, 24);
        assert!(ctx.memory_usage() > 0);
        assert_eq!(ctx.factorizations(), 1);

        // smaller systems reuse the buffers
        let before = ctx.memory_usage();
        ctx.with_workspace(3, |_| ());
        assert_eq!(ctx.memory_usage(), before);
        assert_eq!(ctx.finish(), 0);
    }

    #[test]
    fn test_factor_tracking() {
        let ctx = SparseContext::new(LinalgSettings::default()).unwrap();
        ctx.track_factor(100);
        ctx.track_factor(50);
        ctx.untrack_factor(100);
        assert_eq!(ctx.memory_usage(), 50);
        assert_eq!(ctx.peak_memory(), 150);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = LinalgSettings {
            pivot_tol: f64::NAN,
            ..Default::default()
        };
        assert!(SparseContext::new(settings).is_err());
    }

    #[test]
    fn test_repeated_open_close() {
        for _ in 0..5 {
            let ctx = SparseContext::new(LinalgSettings::default()).unwrap();
            ctx.with_workspace(4, |_| ());
            assert_eq!(ctx.finish(), 0);
        }
    }
}
