//! Outstanding fetch tasks and their timeout-driven retries.

use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rust_ccdn_common::{metrics::CcdnMetrics, ContentId, HostId, Result};

use crate::audit::{AuditLog, TaskRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    /// Waiting for a holder to reply
    Pending,
    /// A holder replied and a transfer is under way
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub requester: HostId,
    pub content: ContentId,
    pub remote: Option<HostId>,
    pub state: TaskState,
    pub start: Duration,
    pub last_retry: Duration,
    pub retries: u32,
}

/// At most one live task per `(requester, content)`.
#[derive(Debug)]
pub struct TaskTracker {
    tasks: BTreeMap<(HostId, ContentId), Task>,
    timeout: Duration,
    max_retries: u32,
    audit: AuditLog,
    metrics: Arc<CcdnMetrics>,
}

impl TaskTracker {
    pub fn new(timeout: Duration, max_retries: u32, audit: AuditLog, metrics: Arc<CcdnMetrics>) -> Self {
        Self {
            tasks: BTreeMap::new(),
            timeout,
            max_retries,
            audit,
            metrics,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, requester: HostId, content: ContentId) -> Option<&Task> {
        self.tasks.get(&(requester, content))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Number of tasks still waiting for a reply.
    pub fn pending(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.state == TaskState::Pending)
            .count()
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Start tracking a fetch. Returns false if one is already live.
    pub fn register(&mut self, requester: HostId, content: ContentId, now: Duration) -> bool {
        let key = (requester, content);
        if self.tasks.contains_key(&key) {
            debug!("host {} already fetching {}", requester, content);
            return false;
        }
        self.tasks.insert(
            key,
            Task {
                requester,
                content,
                remote: None,
                state: TaskState::Pending,
                start: now,
                last_retry: now,
                retries: 0,
            },
        );
        self.metrics.tasks_registered.increment();
        self.metrics.tasks_pending.increment();
        true
    }

    /// Record that `remote` answered the fetch.
    pub fn accept(&mut self, requester: HostId, remote: HostId, content: ContentId) -> bool {
        match self.tasks.get_mut(&(requester, content)) {
            Some(task) => {
                if task.state == TaskState::Pending {
                    self.metrics.tasks_pending.decrement();
                }
                task.state = TaskState::Accepted;
                task.remote = Some(remote);
                true
            }
            None => {
                debug!("no task for host {} and {} to accept", requester, content);
                false
            }
        }
    }

    /// Pending tasks that have waited at least the timeout since their last
    /// attempt. Their retry time is reset to `now`. A due task that already
    /// used up its retries is dropped instead.
    pub fn review(&mut self, now: Duration) -> Vec<(HostId, ContentId)> {
        let timeout = self.timeout;
        let max_retries = self.max_retries;
        let mut due = Vec::new();
        let mut abandoned = Vec::new();

        for (key, task) in self.tasks.iter_mut() {
            if task.state != TaskState::Pending || now < task.last_retry + timeout {
                continue;
            }
            if task.retries >= max_retries {
                abandoned.push(*key);
            } else {
                task.retries += 1;
                task.last_retry = now;
                due.push(*key);
            }
        }

        for (requester, content) in abandoned {
            if self.tasks.remove(&(requester, content)).is_some() {
                warn!(
                    "host {} gave up on {} after {} retries",
                    requester, content, max_retries
                );
                self.metrics.tasks_pending.decrement();
                self.metrics.tasks_abandoned.increment();
            }
        }
        due
    }

    /// Retire a task and write it to the audit log. `holder` stands in for
    /// the remote when no reply was seen.
    pub fn finish(
        &mut self,
        requester: HostId,
        content: ContentId,
        holder: HostId,
        now: Duration,
    ) -> Result<Option<TaskRecord>> {
        let task = match self.tasks.remove(&(requester, content)) {
            Some(task) => task,
            None => {
                debug!("host {} finished {} without a live task", requester, content);
                return Ok(None);
            }
        };
        if task.state == TaskState::Pending {
            self.metrics.tasks_pending.decrement();
        }

        let record = TaskRecord {
            content,
            remote: task.remote.unwrap_or(holder),
            local: requester,
            start: task.start,
            end: now,
        };
        info!("{}", record);

        let latency = now.saturating_sub(task.start);
        self.metrics
            .fetch_latency
            .observe(u64::try_from(latency.as_micros()).unwrap_or(u64::MAX));
        self.metrics.tasks_finished.increment();

        self.audit.append(record)?;
        Ok(Some(record))
    }
}
