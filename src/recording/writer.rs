//! Buffered recording writer — drains both stream queues on a background
//! schedule and appends rows to the session files.
//!
//! At most one flush runs at a time: an invocation that finds an earlier
//! run still in progress is skipped outright (never queued) and counted.
//! I/O failure on one stream is contained there; the drained rows for
//! that period are lost, the other stream still writes, and the session
//! continues.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use super::format::{self, SessionPaths};
use crate::sample::GazeSample;

/// Configuration for the flush schedule.
#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    /// Period between scheduled flushes.
    pub flush_interval: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
        }
    }
}

// ── Stats ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct WriterStats {
    rows_written: AtomicU64,
    rows_dropped: AtomicU64,
    runs_completed: AtomicU64,
    runs_skipped: AtomicU64,
}

/// Point-in-time copy of the writer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterStatsSnapshot {
    pub rows_written: u64,
    pub rows_dropped: u64,
    pub runs_completed: u64,
    pub runs_skipped: u64,
}

// ── Outcome ─────────────────────────────────────────────────

/// Result of one flush invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Ran to completion; row counts per stream.
    Ran { object_rows: usize, gaze_rows: usize },
    /// An earlier run was still in progress; nothing was done.
    Skipped,
    /// No session paths are set; queues were left untouched.
    Idle,
}

// ── Worker ──────────────────────────────────────────────────

/// Drains the object and gaze queues into the current session files.
pub struct FlushWorker {
    object_rx: Receiver<String>,
    gaze_rx: Receiver<GazeSample>,
    paths: Mutex<Option<SessionPaths>>,
    busy: AtomicBool,
    stats: WriterStats,
}

impl FlushWorker {
    pub fn new(object_rx: Receiver<String>, gaze_rx: Receiver<GazeSample>) -> Self {
        Self {
            object_rx,
            gaze_rx,
            paths: Mutex::new(None),
            busy: AtomicBool::new(false),
            stats: WriterStats::default(),
        }
    }

    /// Point the worker at a new session's files.
    pub fn set_paths(&self, paths: SessionPaths) {
        *self.paths.lock().unwrap() = Some(paths);
    }

    /// Discard everything currently buffered in both queues.
    pub fn clear_queues(&self) {
        let mut discarded = 0usize;
        while self.object_rx.try_recv().is_ok() {
            discarded += 1;
        }
        while self.gaze_rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("flush worker: discarded {} buffered rows", discarded);
        }
    }

    /// One flush invocation. Skipped entirely if a previous invocation is
    /// still running.
    pub fn run_once(&self) -> FlushOutcome {
        if self.busy.swap(true, Ordering::AcqRel) {
            self.stats.runs_skipped.fetch_add(1, Ordering::Relaxed);
            warn!("flush worker: previous run still in progress, skipping this period");
            return FlushOutcome::Skipped;
        }
        let outcome = self.flush();
        self.busy.store(false, Ordering::Release);
        outcome
    }

    fn flush(&self) -> FlushOutcome {
        let paths = match self.paths.lock().unwrap().clone() {
            Some(p) => p,
            None => return FlushOutcome::Idle,
        };

        // Drain to empty first; rows enqueued concurrently with the drain
        // are picked up too. Once drained, rows either hit the file or
        // are lost — there is no retry.
        let object_rows: Vec<String> = self.object_rx.try_iter().collect();
        let gaze_rows: Vec<String> = self
            .gaze_rx
            .try_iter()
            .map(|s| format::gaze_row(&s))
            .collect();

        let object_written = self.write_stream(&paths.object, &object_rows);
        let gaze_written = self.write_stream(&paths.gaze, &gaze_rows);

        self.stats.runs_completed.fetch_add(1, Ordering::Relaxed);
        FlushOutcome::Ran {
            object_rows: object_written,
            gaze_rows: gaze_written,
        }
    }

    /// Append rows to one stream file. Failure is logged and contained;
    /// returns the number of rows actually written.
    fn write_stream(&self, path: &Path, rows: &[String]) -> usize {
        if rows.is_empty() {
            return 0;
        }
        match append_rows(path, rows) {
            Ok(n) => {
                self.stats.rows_written.fetch_add(n as u64, Ordering::Relaxed);
                n
            }
            Err(e) => {
                self.stats
                    .rows_dropped
                    .fetch_add(rows.len() as u64, Ordering::Relaxed);
                warn!(
                    "flush worker: dropping {} rows for {}: {}",
                    rows.len(),
                    path.display(),
                    e
                );
                0
            }
        }
    }

    pub fn stats(&self) -> WriterStatsSnapshot {
        WriterStatsSnapshot {
            rows_written: self.stats.rows_written.load(Ordering::Relaxed),
            rows_dropped: self.stats.rows_dropped.load(Ordering::Relaxed),
            runs_completed: self.stats.runs_completed.load(Ordering::Relaxed),
            runs_skipped: self.stats.runs_skipped.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    pub(crate) fn force_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::Release);
    }
}

fn append_rows(path: &Path, rows: &[String]) -> std::io::Result<usize> {
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut out = BufWriter::new(file);
    for row in rows {
        writeln!(out, "{}", row)?;
    }
    out.flush()?;
    Ok(rows.len())
}

// ── Schedule ────────────────────────────────────────────────

/// Spawn the periodic flush thread. The thread sleeps in short slices so
/// a stop request is honored promptly; the caller joins the handle and
/// then performs the final synchronous flush itself.
pub fn spawn_flush_schedule(
    worker: Arc<FlushWorker>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("gaze-flush".to_string())
        .spawn(move || {
            info!("flush schedule up, period {:?}", interval);
            let slice = Duration::from_millis(50);
            'outer: loop {
                let mut slept = Duration::ZERO;
                while slept < interval {
                    if stop.load(Ordering::Acquire) {
                        break 'outer;
                    }
                    let step = slice.min(interval - slept);
                    std::thread::sleep(step);
                    slept += step;
                }
                worker.run_once();
            }
            info!("flush schedule down");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Ray, Vec3};
    use crate::sample::EyeState;
    use crossbeam_channel::unbounded;

    fn sample(ts: i64) -> GazeSample {
        let fwd = Vec3::new(0.0, 0.0, 1.0);
        GazeSample {
            device_timestamp: ts,
            host_timestamp: 0.0,
            left_ray: Ray::new(Vec3::ZERO, fwd),
            right_ray: Ray::new(Vec3::ZERO, fwd),
            combined_ray: Ray::new(Vec3::ZERO, fwd),
            gaze_distance: 1.0,
            left_eye: EyeState::invalid(),
            right_eye: EyeState::invalid(),
        }
    }

    #[test]
    fn test_idle_without_session_paths() {
        let (_otx, orx) = unbounded();
        let (_gtx, grx) = unbounded::<GazeSample>();
        let worker = FlushWorker::new(orx, grx);
        assert_eq!(worker.run_once(), FlushOutcome::Idle);
    }

    #[test]
    fn test_flush_writes_both_streams() {
        let dir = tempfile::tempdir().unwrap();
        let (otx, orx) = unbounded();
        let (gtx, grx) = unbounded();
        let worker = FlushWorker::new(orx, grx);
        worker.set_paths(SessionPaths {
            object: dir.path().join("s_head.csv"),
            gaze: dir.path().join("s_gaze.csv"),
        });

        otx.send("0.1,1,msg,".to_string()).unwrap();
        otx.send("0.2,2,,".to_string()).unwrap();
        gtx.send(sample(1)).unwrap();

        match worker.run_once() {
            FlushOutcome::Ran {
                object_rows,
                gaze_rows,
            } => {
                assert_eq!(object_rows, 2);
                assert_eq!(gaze_rows, 1);
            }
            other => panic!("expected Ran, got {:?}", other),
        }

        let head = std::fs::read_to_string(dir.path().join("s_head.csv")).unwrap();
        assert_eq!(head.lines().count(), 2);
        let gaze = std::fs::read_to_string(dir.path().join("s_gaze.csv")).unwrap();
        assert!(gaze.starts_with("1,"));
        assert_eq!(worker.stats().rows_written, 3);
    }

    #[test]
    fn test_second_flush_appends() {
        let dir = tempfile::tempdir().unwrap();
        let (otx, orx) = unbounded();
        let (_gtx, grx) = unbounded::<GazeSample>();
        let worker = FlushWorker::new(orx, grx);
        worker.set_paths(SessionPaths {
            object: dir.path().join("s_head.csv"),
            gaze: dir.path().join("s_gaze.csv"),
        });

        otx.send("row1,".to_string()).unwrap();
        worker.run_once();
        otx.send("row2,".to_string()).unwrap();
        worker.run_once();

        let head = std::fs::read_to_string(dir.path().join("s_head.csv")).unwrap();
        assert_eq!(head, "row1,\nrow2,\n");
    }

    #[test]
    fn test_overlap_guard_skips_and_counts() {
        let (_otx, orx) = unbounded::<String>();
        let (_gtx, grx) = unbounded::<GazeSample>();
        let worker = FlushWorker::new(orx, grx);

        // Simulate an artificially slow first run still holding the guard.
        worker.force_busy(true);
        assert_eq!(worker.run_once(), FlushOutcome::Skipped);
        assert_eq!(worker.run_once(), FlushOutcome::Skipped);
        let stats = worker.stats();
        assert_eq!(stats.runs_skipped, 2);
        assert_eq!(stats.runs_completed, 0);

        worker.force_busy(false);
        assert_eq!(worker.run_once(), FlushOutcome::Idle);
    }

    #[test]
    fn test_stream_failure_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let (otx, orx) = unbounded();
        let (gtx, grx) = unbounded();
        let worker = FlushWorker::new(orx, grx);
        // Object path is a directory: append will fail there.
        worker.set_paths(SessionPaths {
            object: dir.path().to_path_buf(),
            gaze: dir.path().join("s_gaze.csv"),
        });

        otx.send("doomed,".to_string()).unwrap();
        gtx.send(sample(9)).unwrap();

        match worker.run_once() {
            FlushOutcome::Ran {
                object_rows,
                gaze_rows,
            } => {
                assert_eq!(object_rows, 0);
                assert_eq!(gaze_rows, 1, "gaze stream must still write");
            }
            other => panic!("expected Ran, got {:?}", other),
        }
        let stats = worker.stats();
        assert_eq!(stats.rows_dropped, 1);
        assert_eq!(stats.rows_written, 1);
        // Dropped rows are not retried.
        assert_eq!(worker.run_once(), FlushOutcome::Ran { object_rows: 0, gaze_rows: 0 });
    }

    #[test]
    fn test_clear_queues_discards_buffered_rows() {
        let (otx, orx) = unbounded();
        let (gtx, grx) = unbounded();
        let worker = FlushWorker::new(orx, grx);
        otx.send("stale,".to_string()).unwrap();
        gtx.send(sample(1)).unwrap();

        worker.clear_queues();

        let dir = tempfile::tempdir().unwrap();
        worker.set_paths(SessionPaths {
            object: dir.path().join("s_head.csv"),
            gaze: dir.path().join("s_gaze.csv"),
        });
        assert_eq!(
            worker.run_once(),
            FlushOutcome::Ran {
                object_rows: 0,
                gaze_rows: 0
            }
        );
    }

    #[test]
    fn test_schedule_runs_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let (otx, orx) = unbounded();
        let (_gtx, grx) = unbounded::<GazeSample>();
        let worker = Arc::new(FlushWorker::new(orx, grx));
        worker.set_paths(SessionPaths {
            object: dir.path().join("s_head.csv"),
            gaze: dir.path().join("s_gaze.csv"),
        });
        otx.send("scheduled,".to_string()).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let handle =
            spawn_flush_schedule(worker.clone(), Duration::from_millis(30), stop.clone()).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while worker.stats().runs_completed == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        stop.store(true, Ordering::Release);
        handle.join().unwrap();

        assert!(worker.stats().runs_completed >= 1);
        let head = std::fs::read_to_string(dir.path().join("s_head.csv")).unwrap();
        assert_eq!(head, "scheduled,\n");
    }
}
