// Shared Job Lists
// One list per (prefix, queue name); every queue and worker handle on that pair shares it.

use processor_core::domain::Job;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

/// Snapshot of a list's job counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub waiting: usize,
    pub delayed: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

/// A job that exhausted its attempts
#[derive(Debug, Clone)]
pub struct FailedJob {
    pub job: Job,
    pub reason: String,
}

#[derive(Default)]
struct ListState {
    waiting: VecDeque<Job>,
    delayed: usize,
    active: usize,
    completed: Vec<Job>,
    completed_count: usize,
    failed: Vec<FailedJob>,
}

pub struct JobList {
    key: String,
    state: Mutex<ListState>,
    available: Notify,
}

impl JobList {
    pub(crate) fn new(prefix: &str, name: &str) -> Self {
        Self {
            key: format!("{}:{}", prefix, name),
            state: Mutex::new(ListState::default()),
            available: Notify::new(),
        }
    }

    /// `{prefix}:{name}`
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Enqueue a job. FIFO within a priority; lower priority values run first.
    pub(crate) fn push(&self, job: Job) {
        {
            let mut state = self.lock();
            let priority = job.opts.priority.unwrap_or(0);
            let position = state
                .waiting
                .iter()
                .position(|queued| queued.opts.priority.unwrap_or(0) > priority)
                .unwrap_or(state.waiting.len());
            state.waiting.insert(position, job);
        }
        self.available.notify_one();
    }

    pub(crate) fn mark_delayed(&self) {
        self.lock().delayed += 1;
    }

    /// Move a delayed job into the waiting list
    pub(crate) fn promote(&self, job: Job) {
        {
            let mut state = self.lock();
            state.delayed = state.delayed.saturating_sub(1);
        }
        self.push(job);
    }

    /// Wait for the next job and mark it active. Cancel-safe.
    pub(crate) async fn pop(&self) -> Job {
        loop {
            if let Some(job) = self.try_pop() {
                return job;
            }
            self.available.notified().await;
        }
    }

    fn try_pop(&self) -> Option<Job> {
        let mut state = self.lock();
        let job = state.waiting.pop_front()?;
        state.active += 1;
        if !state.waiting.is_empty() {
            // Hand the remaining work to another idle consumer
            self.available.notify_one();
        }
        Some(job)
    }

    pub(crate) fn complete(&self, job: Job) {
        let mut state = self.lock();
        state.active = state.active.saturating_sub(1);
        state.completed_count += 1;
        if !job.opts.remove_on_complete {
            state.completed.push(job);
        }
    }

    /// Put a failed job back for another attempt
    pub(crate) fn retry(&self, job: Job) {
        {
            let mut state = self.lock();
            state.active = state.active.saturating_sub(1);
        }
        self.push(job);
    }

    pub(crate) fn fail(&self, job: Job, reason: String) {
        let mut state = self.lock();
        state.active = state.active.saturating_sub(1);
        state.failed.push(FailedJob { job, reason });
    }

    pub fn counts(&self) -> JobCounts {
        let state = self.lock();
        JobCounts {
            waiting: state.waiting.len(),
            delayed: state.delayed,
            active: state.active,
            completed: state.completed_count,
            failed: state.failed.len(),
        }
    }

    pub fn waiting(&self) -> Vec<Job> {
        self.lock().waiting.iter().cloned().collect()
    }

    pub fn completed(&self) -> Vec<Job> {
        self.lock().completed.clone()
    }

    pub fn failed(&self) -> Vec<FailedJob> {
        self.lock().failed.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use processor_core::domain::JobOptions;
    use serde_json::json;

    fn job(id: &str, priority: Option<i32>) -> Job {
        let opts = JobOptions {
            priority,
            ..Default::default()
        };
        Job::new(id, 0, "emails", "send", json!({}), opts)
    }

    #[test]
    fn test_fifo_within_priority() {
        let list = JobList::new("bull", "emails");
        list.push(job("a", None));
        list.push(job("b", None));
        list.push(job("c", None));

        let ids: Vec<String> = list.waiting().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_lower_priority_value_runs_first() {
        let list = JobList::new("bull", "emails");
        list.push(job("low", Some(10)));
        list.push(job("plain", None));
        list.push(job("high", Some(1)));

        let ids: Vec<String> = list.waiting().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["plain", "high", "low"]);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let list = std::sync::Arc::new(JobList::new("bull", "emails"));
        let consumer = list.clone();
        let popped = tokio::spawn(async move { consumer.pop().await });

        tokio::task::yield_now().await;
        list.push(job("late", None));

        assert_eq!(popped.await.unwrap().id, "late");
        assert_eq!(list.counts().active, 1);
    }

    #[test]
    fn test_counts_track_lifecycle() {
        let list = JobList::new("bull", "emails");
        list.push(job("a", None));
        list.push(job("b", None));
        list.push(job("c", None));

        let a = list.try_pop().unwrap();
        list.complete(a);
        let b = list.try_pop().unwrap();
        list.fail(b, "boom".to_string());

        let counts = list.counts();
        assert_eq!(counts.waiting, 1);
        assert_eq!(counts.active, 0);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(list.failed()[0].reason, "boom");
        assert_eq!(list.key(), "bull:emails");
    }

    #[test]
    fn test_remove_on_complete_keeps_count_only() {
        let list = JobList::new("bull", "emails");
        let mut transient = job("a", None);
        transient.opts.remove_on_complete = true;
        list.push(transient);

        let popped = list.try_pop().unwrap();
        list.complete(popped);

        assert_eq!(list.counts().completed, 1);
        assert!(list.completed().is_empty());
    }
}
