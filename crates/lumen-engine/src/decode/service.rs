use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::render::Bitmap;

use super::{DecodeError, DecodeErrorKind};

/// Caller-chosen request handle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone)]
pub enum DecodeSource {
    /// Relative paths resolve against [`DecodeConfig::base_dir`].
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

#[derive(Debug, Clone)]
pub struct DecodeConfig {
    pub base_dir: Option<PathBuf>,
    /// Worker threads; at least one is started.
    pub workers: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self { base_dir: None, workers: 2 }
    }
}

#[derive(Debug)]
pub enum DecodeEvent {
    Ready {
        id: RequestId,
        bitmap: Bitmap,
        has_alpha: bool,
    },
    Failed {
        id: RequestId,
        kind: DecodeErrorKind,
        message: String,
    },
}

impl DecodeEvent {
    pub fn id(&self) -> RequestId {
        match self {
            DecodeEvent::Ready { id, .. } | DecodeEvent::Failed { id, .. } => *id,
        }
    }
}

struct Job {
    ticket: u64,
    source: DecodeSource,
}

struct Outcome {
    ticket: u64,
    result: Result<Bitmap, DecodeError>,
}

/// Decodes images on worker threads.
///
/// Every request gets a ticket; results are only delivered while the ticket
/// is still the live one for its id. Cancelling (or re-requesting) an id
/// retires the old ticket, so a stale result is dropped on arrival.
pub struct DecodeService {
    base_dir: Option<PathBuf>,
    jobs: Option<Sender<Job>>,
    outcomes: Receiver<Outcome>,
    /// Tickets the workers may skip.
    canceled: Arc<Mutex<HashSet<u64>>>,
    pending: HashMap<RequestId, u64>,
    tickets: HashMap<u64, RequestId>,
    next_ticket: u64,
    workers: Vec<JoinHandle<()>>,
}

impl DecodeService {
    pub fn new(config: DecodeConfig) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (out_tx, out_rx) = mpsc::channel::<Outcome>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let canceled = Arc::new(Mutex::new(HashSet::new()));

        let workers = (0..config.workers.max(1))
            .filter_map(|i| {
                let jobs = job_rx.clone();
                let outcomes = out_tx.clone();
                let canceled = canceled.clone();
                std::thread::Builder::new()
                    .name(format!("lumen-decode-{i}"))
                    .spawn(move || worker_loop(&jobs, &outcomes, &canceled))
                    .map_err(|err| log::error!("failed to start decode worker: {err}"))
                    .ok()
            })
            .collect();

        Self {
            base_dir: config.base_dir,
            jobs: Some(job_tx),
            outcomes: out_rx,
            canceled,
            pending: HashMap::new(),
            tickets: HashMap::new(),
            next_ticket: 0,
            workers,
        }
    }

    /// Queues a decode. Re-using a pending id replaces the earlier request.
    pub fn request(&mut self, id: RequestId, source: DecodeSource) {
        self.cancel(id);

        let source = match source {
            DecodeSource::Path(path) => DecodeSource::Path(self.resolve(&path)),
            bytes => bytes,
        };
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let Some(jobs) = self.jobs.as_ref() else { return };
        if jobs.send(Job { ticket, source }).is_err() {
            log::error!("decode workers are gone; dropping request {id:?}");
            return;
        }
        self.pending.insert(id, ticket);
        self.tickets.insert(ticket, id);
    }

    /// Drops interest in `id`. Idempotent; unknown ids are ignored.
    pub fn cancel(&mut self, id: RequestId) {
        let Some(ticket) = self.pending.remove(&id) else { return };
        self.tickets.remove(&ticket);
        if let Ok(mut canceled) = self.canceled.lock() {
            canceled.insert(ticket);
        }
        log::debug!("decode {id:?} canceled");
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Collects finished requests without blocking.
    pub fn poll(&mut self) -> Vec<DecodeEvent> {
        let mut events = Vec::new();
        while let Ok(outcome) = self.outcomes.try_recv() {
            let Some(id) = self.tickets.remove(&outcome.ticket) else {
                // Canceled or replaced after the worker picked it up.
                if let Ok(mut canceled) = self.canceled.lock() {
                    canceled.remove(&outcome.ticket);
                }
                continue;
            };
            self.pending.remove(&id);

            events.push(match outcome.result {
                Ok(bitmap) => DecodeEvent::Ready { id, has_alpha: bitmap.has_alpha, bitmap },
                Err(err) => {
                    log::warn!("decode {id:?} failed: {err}");
                    DecodeEvent::Failed { id, kind: err.kind(), message: err.to_string() }
                }
            });
        }
        events
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Drop for DecodeService {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loops.
        self.jobs = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(jobs: &Mutex<Receiver<Job>>, outcomes: &Sender<Outcome>, canceled: &Mutex<HashSet<u64>>) {
    loop {
        let job = match jobs.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => return,
        };
        let Ok(job) = job else { return };

        let skip = canceled.lock().map(|mut c| c.remove(&job.ticket)).unwrap_or(false);
        if skip {
            continue;
        }

        let result = decode(&job.source);
        if outcomes.send(Outcome { ticket: job.ticket, result }).is_err() {
            return;
        }
    }
}

fn decode(source: &DecodeSource) -> Result<Bitmap, DecodeError> {
    let bytes: std::borrow::Cow<'_, [u8]> = match source {
        DecodeSource::Path(path) => std::fs::read(path)
            .map_err(|source| DecodeError::Io { path: path.clone(), source })?
            .into(),
        DecodeSource::Bytes(bytes) => bytes.as_ref().into(),
    };

    let image = image::load_from_memory(&bytes)?.into_rgba8();
    let (width, height) = image.dimensions();
    Bitmap::from_straight(width, height, image.into_raw()).ok_or(DecodeError::InvalidSize { width, height })
}
