//! Persistent job queue.
//!
//! The queue is stored as `queue.json` in the work directory so a batch
//! can be resumed after a restart. Saves are atomic (temp file + rename).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::types::{JobStatus, QueueEntry};

const QUEUE_FILE: &str = "queue.json";
const QUEUE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct QueueState {
    version: u32,
    jobs: Vec<QueueEntry>,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            version: QUEUE_VERSION,
            jobs: Vec::new(),
        }
    }
}

/// Ordered list of jobs, persisted to disk after each mutation.
#[derive(Debug)]
pub struct JobQueue {
    path: Option<PathBuf>,
    state: QueueState,
}

impl JobQueue {
    /// Open the queue stored in `work_dir`, starting empty if the file is
    /// missing or unreadable.
    pub fn new(work_dir: &Path) -> Self {
        let path = work_dir.join(QUEUE_FILE);
        let state = Self::load(&path);
        Self {
            path: Some(path),
            state,
        }
    }

    /// An in-memory queue that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: QueueState::default(),
        }
    }

    fn load(path: &Path) -> QueueState {
        if !path.exists() {
            return QueueState::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<QueueState>(&contents) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse queue file, starting empty");
                    QueueState::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read queue file, starting empty");
                QueueState::default()
            }
        }
    }

    /// Write the queue to disk. No-op for in-memory queues.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn jobs(&self) -> &[QueueEntry] {
        &self.state.jobs
    }

    pub fn len(&self) -> usize {
        self.state.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.jobs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&QueueEntry> {
        self.state.jobs.get(index)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&QueueEntry> {
        self.state.jobs.iter().find(|j| j.id == id)
    }

    /// Jobs that have not yet run.
    pub fn pending(&self) -> Vec<QueueEntry> {
        self.state
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .cloned()
            .collect()
    }

    pub fn add(&mut self, entry: QueueEntry) {
        self.state.jobs.push(entry);
    }

    pub fn add_all(&mut self, entries: impl IntoIterator<Item = QueueEntry>) {
        self.state.jobs.extend(entries);
    }

    /// Remove the job at `index`, returning it if present.
    pub fn remove(&mut self, index: usize) -> Option<QueueEntry> {
        if index < self.state.jobs.len() {
            Some(self.state.jobs.remove(index))
        } else {
            None
        }
    }

    /// Move a job from one position to another.
    pub fn move_job(&mut self, from: usize, to: usize) -> bool {
        let len = self.state.jobs.len();
        if from >= len || to >= len || from == to {
            return false;
        }
        let job = self.state.jobs.remove(from);
        self.state.jobs.insert(to, job);
        true
    }

    /// Update the status of the job with the given ID.
    pub fn set_status(&mut self, id: &str, status: JobStatus) -> bool {
        match self.state.jobs.iter_mut().find(|j| j.id == id) {
            Some(job) => {
                job.status = status;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.state.jobs.clear();
    }

    /// Drop jobs that have reached a terminal state.
    pub fn clear_finished(&mut self) {
        self.state.jobs.retain(|j| !j.status.is_finished());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::AudioConvertOptions;
    use crate::jobs::types::{JobKind, JobSpec};

    fn entry(input: &str) -> QueueEntry {
        QueueEntry::new(JobSpec {
            input: PathBuf::from(input),
            output_dir: None,
            kind: JobKind::Audio(AudioConvertOptions::default()),
        })
    }

    #[test]
    fn add_remove_and_reorder() {
        let mut queue = JobQueue::in_memory();
        queue.add(entry("/a.wav"));
        queue.add(entry("/b.wav"));
        queue.add(entry("/c.wav"));
        assert_eq!(queue.len(), 3);

        assert!(queue.move_job(2, 0));
        assert_eq!(queue.get(0).unwrap().name, "c.wav");

        let removed = queue.remove(1).unwrap();
        assert_eq!(removed.name, "a.wav");
        assert_eq!(queue.len(), 2);

        assert!(!queue.move_job(5, 0));
    }

    #[test]
    fn set_status_by_id() {
        let mut queue = JobQueue::in_memory();
        let job = entry("/a.wav");
        let id = job.id.clone();
        queue.add(job);

        assert!(queue.set_status(&id, JobStatus::Running));
        assert_eq!(queue.get_by_id(&id).unwrap().status, JobStatus::Running);
        assert!(!queue.set_status("missing", JobStatus::Cancelled));
    }

    #[test]
    fn clear_finished_keeps_pending() {
        let mut queue = JobQueue::in_memory();
        let done = entry("/a.wav");
        let done_id = done.id.clone();
        queue.add(done);
        queue.add(entry("/b.wav"));

        queue.set_status(&done_id, JobStatus::Cancelled);
        queue.clear_finished();

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.jobs()[0].name, "b.wav");
        assert_eq!(queue.pending().len(), 1);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let mut queue = JobQueue::new(dir.path());
        queue.add(entry("/music/track.wav"));
        queue.save().unwrap();

        let reopened = JobQueue::new(dir.path());
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.jobs()[0].name, "track.wav");
    }

    #[test]
    fn corrupt_queue_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(QUEUE_FILE), "{not json").unwrap();

        let queue = JobQueue::new(dir.path());
        assert!(queue.is_empty());
    }
}
