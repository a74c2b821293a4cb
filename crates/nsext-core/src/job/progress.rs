//! Hierarchical job progress.
//!
//! Progress is a stack of levels. `push_level(n)` opens a level of `n` steps
//! inside the current step of its parent; the returned guard pops the level on
//! every exit path, and popping completes that parent step. Leaf work calls
//! [`JobProgress::step`]. Because a popped level is always replaced by one
//! whole parent step, the reported completion never goes backwards, even when
//! the work inside the level failed half way.

use parking_lot::Mutex;
use scopeguard::ScopeGuard;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct Level {
    steps: usize,
    done: usize,
}

#[derive(Debug, Default)]
struct ProgressStack {
    levels: Vec<Level>,
    finished: bool,
}

impl ProgressStack {
    fn complete_step(&mut self) {
        if let Some(level) = self.levels.last_mut() {
            level.done = (level.done + 1).min(level.steps);
        }
    }

    fn offset(&self) -> f64 {
        if self.finished {
            return 1.0;
        }

        let mut offset = 0.0;
        let mut scale = 1.0;
        for level in &self.levels {
            if level.steps == 0 {
                break;
            }
            offset += scale * level.done as f64 / level.steps as f64;
            scale /= level.steps as f64;
        }
        offset
    }
}

/// Guard returned by [`JobProgress::push_level`]; pops the level when dropped.
pub type LevelGuard = ScopeGuard<JobProgress, fn(JobProgress)>;

/// Shared progress handle of one job.
#[derive(Debug, Clone, Default)]
pub struct JobProgress {
    inner: Arc<Mutex<ProgressStack>>,
}

impl JobProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a level of `steps` steps.
    #[must_use = "the level is popped as soon as the guard is dropped"]
    pub fn push_level(&self, steps: usize) -> LevelGuard {
        self.inner.lock().levels.push(Level { steps, done: 0 });
        scopeguard::guard(self.clone(), JobProgress::pop_level as fn(JobProgress))
    }

    /// Complete one step of the current level.
    pub fn step(&self) {
        self.inner.lock().complete_step();
    }

    /// Completion in `[0.0, 1.0]`.
    pub fn offset(&self) -> f64 {
        self.inner.lock().offset()
    }

    /// Number of open levels.
    pub fn depth(&self) -> usize {
        self.inner.lock().levels.len()
    }

    /// Mark the whole job as done.
    pub fn finish(&self) {
        let mut stack = self.inner.lock();
        stack.levels.clear();
        stack.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.inner.lock().finished
    }

    fn pop_level(self) {
        let mut stack = self.inner.lock();
        if stack.levels.pop().is_some() {
            stack.complete_step();
        }
    }
}
