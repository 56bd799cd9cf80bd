//! Background queue worker.
//!
//! Runs a `QueueProcessor` on its own thread and streams progress back
//! over a crossbeam channel, so a frontend can show live status without
//! blocking on FFmpeg.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::ffmpeg::CancelFlag;

use super::processor::{JobResult, QueueProcessor};
use super::types::QueueEntry;

/// Events emitted while a queue is being processed.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A job started running.
    JobStarted {
        job_id: String,
        name: String,
        index: usize,
        total: usize,
    },
    /// Progress update for the running job.
    JobProgress {
        job_id: String,
        percent: u32,
        speed: Option<f64>,
    },
    /// A job finished successfully.
    JobCompleted {
        job_id: String,
        output: PathBuf,
        elapsed_secs: f64,
    },
    /// A job failed.
    JobFailed { job_id: String, error: String },
    /// A job was cancelled.
    JobCancelled { job_id: String },
    /// All jobs have been processed (or skipped after cancellation).
    QueueFinished {
        completed: usize,
        failed: usize,
        cancelled: usize,
    },
}

/// Handle to a queue running on a background thread.
pub struct QueueWorker {
    handle: JoinHandle<Vec<JobResult>>,
    cancel: CancelFlag,
}

impl QueueWorker {
    /// Start processing `entries` on a new thread.
    ///
    /// Returns the worker handle and the event receiver. Dropping the
    /// receiver does not stop the worker; call [`QueueWorker::cancel`]
    /// for that.
    pub fn spawn(
        processor: QueueProcessor,
        entries: Vec<QueueEntry>,
    ) -> (Self, Receiver<WorkerEvent>) {
        let (tx, rx) = unbounded();
        let cancel = CancelFlag::new();
        let thread_cancel = cancel.clone();

        let handle = thread::spawn(move || run_queue(&processor, &entries, &thread_cancel, &tx));

        (Self { handle, cancel }, rx)
    }

    /// Request cancellation of the running job and all remaining jobs.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the worker to finish and collect the per-job results.
    pub fn join(self) -> Vec<JobResult> {
        self.handle.join().unwrap_or_else(|_| {
            tracing::error!("Queue worker thread panicked");
            Vec::new()
        })
    }
}

fn run_queue(
    processor: &QueueProcessor,
    entries: &[QueueEntry],
    cancel: &CancelFlag,
    tx: &Sender<WorkerEvent>,
) -> Vec<JobResult> {
    let total = entries.len();
    let mut results = Vec::with_capacity(total);

    for (index, entry) in entries.iter().enumerate() {
        if cancel.is_cancelled() {
            let _ = tx.send(WorkerEvent::JobCancelled {
                job_id: entry.id.clone(),
            });
            results.push(JobResult::cancelled(entry, 0.0));
            continue;
        }

        let _ = tx.send(WorkerEvent::JobStarted {
            job_id: entry.id.clone(),
            name: entry.name.clone(),
            index,
            total,
        });

        let job_id = entry.id.clone();
        let progress_tx = tx.clone();
        let on_progress = move |p: &crate::ffmpeg::Progress| {
            let _ = progress_tx.send(WorkerEvent::JobProgress {
                job_id: job_id.clone(),
                percent: p.percent(),
                speed: p.speed,
            });
        };

        let result = processor.process_job(entry, None, Some(cancel), Some(&on_progress));

        let event = if result.cancelled {
            WorkerEvent::JobCancelled {
                job_id: result.job_id.clone(),
            }
        } else if result.success {
            WorkerEvent::JobCompleted {
                job_id: result.job_id.clone(),
                output: result.output_path.clone().unwrap_or_default(),
                elapsed_secs: result.elapsed_secs,
            }
        } else {
            WorkerEvent::JobFailed {
                job_id: result.job_id.clone(),
                error: result.error.clone().unwrap_or_default(),
            }
        };
        let _ = tx.send(event);

        results.push(result);
    }

    let completed = results.iter().filter(|r| r.success).count();
    let cancelled = results.iter().filter(|r| r.cancelled).count();
    let failed = results.len() - completed - cancelled;
    let _ = tx.send(WorkerEvent::QueueFinished {
        completed,
        failed,
        cancelled,
    });

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::AudioConvertOptions;
    use crate::detect::Capabilities;
    use crate::ffmpeg::Toolchain;
    use crate::config::Settings;
    use crate::jobs::types::{JobKind, JobSpec};
    use std::sync::Arc;

    fn offline_processor(dir: &std::path::Path) -> QueueProcessor {
        let caps = Arc::new(Capabilities::new(Toolchain::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            None,
        )));
        QueueProcessor::new(
            Settings::default(),
            caps,
            dir.join("logs"),
            dir.join("out"),
        )
    }

    fn entry(input: &str) -> QueueEntry {
        QueueEntry::new(JobSpec {
            input: PathBuf::from(input),
            output_dir: None,
            kind: JobKind::Audio(AudioConvertOptions::default()),
        })
    }

    #[test]
    fn cancelled_worker_reports_all_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![entry("/a.wav"), entry("/b.wav")];

        let (worker, rx) = QueueWorker::spawn(offline_processor(dir.path()), jobs);
        worker.cancel();
        let results = worker.join();

        assert_eq!(results.len(), 2);
        let events: Vec<WorkerEvent> = rx.try_iter().collect();
        assert!(matches!(
            events.last(),
            Some(WorkerEvent::QueueFinished { .. })
        ));
    }

    #[test]
    fn missing_input_emits_failed_event() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![entry("/no/such/file.wav")];

        let (worker, rx) = QueueWorker::spawn(offline_processor(dir.path()), jobs);
        let results = worker.join();

        assert_eq!(results.len(), 1);
        assert!(!results[0].success);

        let events: Vec<WorkerEvent> = rx.try_iter().collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, WorkerEvent::JobFailed { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, WorkerEvent::QueueFinished { failed: 1, .. })));
    }

    #[test]
    fn failed_job_does_not_stop_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![entry("/no/such/a.wav"), entry("/no/such/b.wav")];
        let ids: Vec<String> = jobs.iter().map(|j| j.id.clone()).collect();

        let (worker, rx) = QueueWorker::spawn(offline_processor(dir.path()), jobs);
        let results = worker.join();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success && !r.cancelled));

        // One JobFailed per job, in queue order
        let events: Vec<WorkerEvent> = rx.try_iter().collect();
        let failed_ids: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::JobFailed { job_id, .. } => Some(job_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(failed_ids, vec![ids[0].as_str(), ids[1].as_str()]);
        assert!(events
            .iter()
            .any(|e| matches!(e, WorkerEvent::QueueFinished { failed: 2, .. })));
    }
}
