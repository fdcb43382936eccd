//! The frontier orchestrator: drains a queue of object ids, uploading each
//! object once and discovering the objects it links to.

use std::{
    collections::{HashSet, VecDeque},
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use indicatif::ProgressBar;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::{
    error::{LedgerOp, PushError},
    git::{encode, extract_links, CanonicalForm, EncodeError, ObjectId},
    ipld::{verify, ContentAddress},
    storage::{DagPutOptions, DagStore, Ledger, ObjectSource},
};

type ObserverFn = dyn FnMut(&ContentAddress, &CanonicalForm) -> anyhow::Result<()> + Send;

/// Called once for every object after its address was verified
#[derive(Default)]
pub enum Observer {
    #[default]
    None,
    Callback(Box<ObserverFn>),
}

impl Observer {
    pub fn callback<F>(f: F) -> Self
    where
        F: FnMut(&ContentAddress, &CanonicalForm) -> anyhow::Result<()> + Send + 'static,
    {
        Observer::Callback(Box::new(f))
    }

    fn notify(&mut self, address: &ContentAddress, form: &CanonicalForm) -> anyhow::Result<()> {
        match self {
            Observer::None => Ok(()),
            Observer::Callback(f) => f(address, form),
        }
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observer::None => write!(f, "Observer::None"),
            Observer::Callback(_) => write!(f, "Observer::Callback(..)"),
        }
    }
}

/// Cooperative cancellation, checked before each object is processed
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a successful push
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    pub root: ObjectId,
    pub root_address: ContentAddress,
    /// Objects uploaded and verified in this run
    pub completed: u64,
    /// Objects enqueued in this run that were not already in the ledger
    pub enqueued_total: u64,
    /// Dequeued objects the ledger already had
    pub skipped: u64,
    /// Canonical bytes handed to the DAG store
    pub bytes: u64,
}

/// `{completed}/{enqueued_total} {id} {address}`
pub fn progress_line(
    completed: u64,
    enqueued_total: u64,
    id: &ObjectId,
    address: &ContentAddress,
) -> String {
    format!("{}/{} {} {}", completed, enqueued_total, id, address)
}

/// One push of the graph below a single root.
///
/// Counters and the frontier live here, so two pushes never share state.
pub struct Push<S, L, D> {
    source: S,
    ledger: L,
    store: D,
    observer: Observer,
    progress: Option<ProgressBar>,
    cancel: CancelToken,
    frontier: VecDeque<ObjectId>,
    queued: HashSet<ObjectId>,
    enqueued_total: u64,
    completed: u64,
    skipped: u64,
    bytes: u64,
}

impl<S, L, D> Push<S, L, D>
where
    S: ObjectSource,
    L: Ledger,
    D: DagStore,
{
    pub fn new(source: S, ledger: L, store: D) -> Self {
        Self {
            source,
            ledger,
            store,
            observer: Observer::None,
            progress: None,
            cancel: CancelToken::new(),
            frontier: VecDeque::new(),
            queued: HashSet::new(),
            enqueued_total: 0,
            completed: 0,
            skipped: 0,
            bytes: 0,
        }
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    /// Mirror the progress line onto `bar` instead of logging it at info
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Token that stops this push before its next object
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Parse `hex` as an object id and push the graph below it
    pub fn push_hash(&mut self, hex: &str) -> Result<PushSummary, PushError> {
        let root = ObjectId::from_hex(hex.trim())?;
        self.run(root)
    }

    /// Push every object reachable from `root` that the ledger lacks
    pub fn run(&mut self, root: ObjectId) -> Result<PushSummary, PushError> {
        self.frontier.clear();
        self.queued.clear();
        self.enqueued_total = 0;
        self.completed = 0;
        self.skipped = 0;
        self.bytes = 0;

        tracing::debug!("Starting push from {}", root);
        self.queued.insert(root);
        self.frontier.push_front(root);
        self.enqueued_total += 1;

        while let Some(id) = self.frontier.pop_front() {
            if let Err(err) = self.process(id) {
                if let Some(bar) = &self.progress {
                    bar.abandon();
                }
                return Err(err);
            }
        }

        if let Some(bar) = &self.progress {
            bar.finish();
        }

        let summary = PushSummary {
            root,
            root_address: ContentAddress::for_object(&root),
            completed: self.completed,
            enqueued_total: self.enqueued_total,
            skipped: self.skipped,
            bytes: self.bytes,
        };
        tracing::info!(
            "Pushed {} object(s) ({} bytes) from {}, {} already present",
            summary.completed,
            summary.bytes,
            root,
            summary.skipped
        );
        Ok(summary)
    }

    fn process(&mut self, id: ObjectId) -> Result<(), PushError> {
        if self.cancel.is_cancelled() {
            return Err(PushError::Cancelled { id });
        }

        if self.in_ledger(&id)? {
            tracing::debug!("Skipping {}: already in ledger", id.short());
            self.enqueued_total = self.enqueued_total.saturating_sub(1);
            self.skipped += 1;
            return Ok(());
        }

        let raw = self.source.read(&id).map_err(|err| read_error(id, err))?;
        let form = encode(raw.kind, raw.size, &raw.data)
            .map_err(|source| PushError::Encoding { id, source })?;
        let expected = ContentAddress::for_object(&id);

        self.completed += 1;
        self.bytes += form.len() as u64;
        self.report_progress(&id, &expected);

        let reported = self
            .store
            .put(&form, &DagPutOptions::GIT_RAW)
            .map_err(|err| PushError::Network {
                id,
                source: err.into(),
            })?;

        // A store that disagrees on the address must not leave a ledger entry
        verify(&id, &expected, &reported)?;

        self.ledger
            .record(&id)
            .map_err(|err| PushError::ledger(id, LedgerOp::Record, err))?;

        self.observer
            .notify(&expected, &form)
            .map_err(|err| PushError::Observer {
                id,
                source: err.into(),
            })?;

        let links = extract_links(&form).map_err(|source| PushError::LinkParse { id, source })?;
        for link in links {
            if self.queued.contains(&link) || self.in_ledger(&link)? {
                continue;
            }
            self.queued.insert(link);
            self.frontier.push_back(link);
            self.enqueued_total += 1;
        }

        Ok(())
    }

    fn in_ledger(&self, id: &ObjectId) -> Result<bool, PushError> {
        self.ledger
            .has(id)
            .map_err(|err| PushError::ledger(*id, LedgerOp::Check, err))
    }

    fn report_progress(&self, id: &ObjectId, address: &ContentAddress) {
        let line = progress_line(self.completed, self.enqueued_total, id, address);
        match &self.progress {
            Some(bar) => {
                bar.set_length(self.enqueued_total);
                bar.set_position(self.completed);
                bar.set_message(line.clone());
                tracing::debug!("{}", line);
            }
            None => tracing::info!("{}", line),
        }
    }
}

impl<S, L, D> Push<S, L, D>
where
    S: ObjectSource + Send + 'static,
    L: Ledger + Send + 'static,
    D: DagStore + Send + 'static,
{
    /// Run the push on a background thread.
    ///
    /// The returned [`Completion`] resolves exactly once with the run's result.
    pub fn spawn(mut self, root: ObjectId) -> Completion {
        let (sender, receiver) = oneshot::channel();
        let handle = thread::spawn(move || {
            let result = self.run(root);
            if sender.send(result).is_err() {
                tracing::debug!("Push result for {} dropped: nobody is waiting", root);
            }
        });
        Completion {
            receiver,
            handle: Some(handle),
        }
    }
}

/// Completion signal of a spawned push
pub struct Completion {
    receiver: oneshot::Receiver<Result<PushSummary, PushError>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Completion {
    /// Block until the push finishes. Must not be called from async code.
    pub fn wait(mut self) -> Result<PushSummary, PushError> {
        let result = self
            .receiver
            .blocking_recv()
            .unwrap_or(Err(PushError::WorkerLost));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        result
    }

    /// Resolve when the push finishes
    pub async fn finished(self) -> Result<PushSummary, PushError> {
        self.receiver.await.unwrap_or(Err(PushError::WorkerLost))
    }
}

/// Sources report a corrupt header as an `EncodeError` inside their context
fn read_error(id: ObjectId, err: anyhow::Error) -> PushError {
    match err.downcast::<EncodeError>() {
        Ok(source) => PushError::Encoding { id, source },
        Err(err) => PushError::SourceRead {
            id,
            source: err.into(),
        },
    }
}
