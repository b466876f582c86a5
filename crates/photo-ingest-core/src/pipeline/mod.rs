//! The concurrent ingest graph.
//!
//! ```text
//! scanner → hasher ×N → router ─┬─→ recycle mover
//!                               └─→ analyzer ×M → suggestion → mover → registrar
//! ```
//!
//! Every arrow is a bounded channel. A stage's output closes once all of its
//! workers have dropped their senders, which only happens after their input
//! has closed and drained, so the run is complete when both branch tails join.

pub mod analyzer;
pub mod hasher;
pub mod mover;
pub mod registrar;
pub mod router;
pub mod suggestion;

use crossbeam::channel::{bounded, Receiver, Sender};
use log::{error, info};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::Config;
use crate::discovery;
use crate::error::{Error, Result};
use crate::persistence::Catalog;
use crate::processing::{NamingBasis, ProgressTracker};
use crate::types::{MediaFile, ProcessContext, RunSummary};

use mover::Mover;
use registrar::Registrar;
use router::{Route, Router};

/// Shared flag asking every stage to stop taking new work
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
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

#[derive(Default)]
struct RunStats {
    scanned: AtomicUsize,
    hashed: AtomicUsize,
    decode_failures: AtomicUsize,
    duplicates: AtomicUsize,
    analyzed: AtomicUsize,
    generic_named: AtomicUsize,
    no_timestamp: AtomicUsize,
    moved: AtomicUsize,
    recycled: AtomicUsize,
    move_failures: AtomicUsize,
    registered: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl RunStats {
    fn snapshot(&self) -> RunSummary {
        let get = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        RunSummary {
            scanned: get(&self.scanned),
            hashed: get(&self.hashed),
            decode_failures: get(&self.decode_failures),
            duplicates: get(&self.duplicates),
            analyzed: get(&self.analyzed),
            generic_named: get(&self.generic_named),
            no_timestamp: get(&self.no_timestamp),
            moved: get(&self.moved),
            recycled: get(&self.recycled),
            move_failures: get(&self.move_failures),
            registered: get(&self.registered),
        }
    }
}

/// One ingest run from the source root into the target and recycle roots
pub struct Pipeline {
    config: Config,
    context: ProcessContext,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: &Config, cancel: CancellationToken) -> Self {
        Self {
            context: ProcessContext::new(
                &config.source_dir,
                &config.target_dir,
                &config.recycle_dir,
            ),
            config: config.clone(),
            cancel,
        }
    }

    /// Scan the source root and push every file through the stages.
    ///
    /// The catalog must already be reconciled. Per-item failures are counted
    /// in the summary; a scan or catalog failure fails the whole run.
    pub fn run(&self) -> Result<RunSummary> {
        let items = discovery::scan(&self.context.source_root)?;

        let stats = Arc::new(RunStats::default());
        stats.scanned.store(items.len(), Ordering::Relaxed);
        let progress = ProgressTracker::new(items.len(), "Ingest", self.config.show_progress);

        let catalog_path = self.config.catalog_path();
        // Catalog as reconciled; later registrations stay invisible to the router
        let router = Router::new(
            &Catalog::open(&catalog_path)?,
            self.config.duplicate_policy,
            self.config.detect_run_duplicates,
        )?;
        let registrar = Registrar::new(
            Catalog::open(&catalog_path)?,
            self.config.registration_batch_size,
        );
        let mover = Mover::new(self.config.max_collision_probes);

        let capacity = self.config.queue_capacity;
        let (scan_tx, scan_rx) = bounded::<MediaFile>(capacity);
        let (hashed_tx, hashed_rx) = bounded::<MediaFile>(capacity);
        let (recycle_tx, recycle_rx) = bounded::<MediaFile>(capacity);
        let (analyze_tx, analyze_rx) = bounded::<MediaFile>(capacity);
        let (analyzed_tx, analyzed_rx) = bounded::<MediaFile>(capacity);
        let (named_tx, named_rx) = bounded::<MediaFile>(capacity);
        let (moved_tx, moved_rx) = bounded::<MediaFile>(capacity);

        let mut handles = Vec::new();

        let cancel = self.cancel.clone();
        handles.push(spawn_stage("scanner", move || {
            run_scan_feed(items, scan_tx, cancel)
        })?);

        for i in 0..self.config.hasher_threads {
            let rx = scan_rx.clone();
            let tx = hashed_tx.clone();
            let stats = stats.clone();
            let cancel = self.cancel.clone();
            handles.push(spawn_stage(&format!("hasher-{}", i), move || {
                run_hash_stage(rx, tx, stats, cancel)
            })?);
        }
        drop(scan_rx);
        drop(hashed_tx);

        {
            let stats = stats.clone();
            let cancel = self.cancel.clone();
            handles.push(spawn_stage("router", move || {
                run_route_stage(router, hashed_rx, recycle_tx, analyze_tx, stats, cancel)
            })?);
        }

        {
            let recycle_root = self.context.recycle_root.clone();
            let stats = stats.clone();
            let progress = progress.clone();
            let cancel = self.cancel.clone();
            handles.push(spawn_stage("recycle-mover", move || {
                run_recycle_stage(mover, recycle_root, recycle_rx, stats, progress, cancel)
            })?);
        }

        for i in 0..self.config.analyzer_threads {
            let rx = analyze_rx.clone();
            let tx = analyzed_tx.clone();
            let stats = stats.clone();
            let cancel = self.cancel.clone();
            handles.push(spawn_stage(&format!("analyzer-{}", i), move || {
                run_analyze_stage(rx, tx, stats, cancel)
            })?);
        }
        drop(analyze_rx);
        drop(analyzed_tx);

        {
            let target_root = self.context.target_root.clone();
            let stats = stats.clone();
            let progress = progress.clone();
            let cancel = self.cancel.clone();
            handles.push(spawn_stage("suggestion", move || {
                run_suggestion_stage(target_root, analyzed_rx, named_tx, stats, progress, cancel)
            })?);
        }

        {
            let stats = stats.clone();
            let progress = progress.clone();
            let cancel = self.cancel.clone();
            handles.push(spawn_stage("mover", move || {
                run_move_stage(mover, named_rx, moved_tx, stats, progress, cancel)
            })?);
        }

        {
            let stats = stats.clone();
            handles.push(spawn_stage("registrar", move || {
                run_register_stage(registrar, moved_rx, stats)
            })?);
        }

        let mut failure = None;
        for handle in handles {
            let name = handle.thread().name().unwrap_or("stage").to_string();
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("Stage {} failed: {}", name, e);
                    failure.get_or_insert(e);
                }
                Err(_) => {
                    error!("Stage {} panicked", name);
                    failure.get_or_insert(Error::Unknown(format!("{} stage panicked", name)));
                }
            }
        }

        let summary = stats.snapshot();
        progress.finish(&format!(
            "{} moved | {} recycled | {} failed",
            summary.moved,
            summary.recycled,
            summary.move_failures + summary.no_timestamp
        ));
        info!(
            "Run finished: {} scanned, {} hashed, {} undecodable, {} duplicates, {} moved, \
             {} recycled, {} generic names, {} without timestamp, {} move failures, {} registered",
            summary.scanned,
            summary.hashed,
            summary.decode_failures,
            summary.duplicates,
            summary.moved,
            summary.recycled,
            summary.generic_named,
            summary.no_timestamp,
            summary.move_failures,
            summary.registered
        );

        if let Some(e) = failure {
            return Err(e);
        }
        if self.cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }
        Ok(summary)
    }
}

fn spawn_stage<F>(name: &str, stage: F) -> Result<JoinHandle<Result<()>>>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(stage)?;
    Ok(handle)
}

fn run_scan_feed(
    items: Vec<MediaFile>,
    tx: Sender<MediaFile>,
    cancel: CancellationToken,
) -> Result<()> {
    for item in items {
        if cancel.is_cancelled() || tx.send(item).is_err() {
            break;
        }
    }
    Ok(())
}

fn run_hash_stage(
    rx: Receiver<MediaFile>,
    tx: Sender<MediaFile>,
    stats: Arc<RunStats>,
    cancel: CancellationToken,
) -> Result<()> {
    for mut item in rx.iter() {
        if cancel.is_cancelled() {
            continue;
        }

        hasher::process(&mut item);
        if item.hash.is_some() {
            bump(&stats.hashed);
        } else {
            bump(&stats.decode_failures);
        }

        if tx.send(item).is_err() {
            break;
        }
    }
    Ok(())
}

fn run_route_stage(
    mut router: Router,
    rx: Receiver<MediaFile>,
    recycle_tx: Sender<MediaFile>,
    analyze_tx: Sender<MediaFile>,
    stats: Arc<RunStats>,
    cancel: CancellationToken,
) -> Result<()> {
    for item in rx.iter() {
        if cancel.is_cancelled() {
            continue;
        }

        let sent = match router.route(&item) {
            Route::Recycle { .. } => {
                bump(&stats.duplicates);
                recycle_tx.send(item).is_ok()
            }
            Route::Analyze => analyze_tx.send(item).is_ok(),
        };
        if !sent {
            break;
        }
    }
    Ok(())
}

fn run_recycle_stage(
    mover: Mover,
    recycle_root: PathBuf,
    rx: Receiver<MediaFile>,
    stats: Arc<RunStats>,
    progress: ProgressTracker,
    cancel: CancellationToken,
) -> Result<()> {
    for mut item in rx.iter() {
        if cancel.is_cancelled() {
            continue;
        }

        let name = item.file_name();
        match mover.move_item(&mut item, &recycle_root, &name) {
            Ok(_) => bump(&stats.recycled),
            Err(_) => bump(&stats.move_failures),
        }
        progress.advance();
    }
    Ok(())
}

fn run_analyze_stage(
    rx: Receiver<MediaFile>,
    tx: Sender<MediaFile>,
    stats: Arc<RunStats>,
    cancel: CancellationToken,
) -> Result<()> {
    for mut item in rx.iter() {
        if cancel.is_cancelled() {
            continue;
        }

        analyzer::process(&mut item);
        bump(&stats.analyzed);

        if tx.send(item).is_err() {
            break;
        }
    }
    Ok(())
}

fn run_suggestion_stage(
    target_root: PathBuf,
    rx: Receiver<MediaFile>,
    tx: Sender<MediaFile>,
    stats: Arc<RunStats>,
    progress: ProgressTracker,
    cancel: CancellationToken,
) -> Result<()> {
    for mut item in rx.iter() {
        if cancel.is_cancelled() {
            continue;
        }

        match suggestion::process(&mut item, &target_root) {
            Ok(basis) => {
                if basis == NamingBasis::FileTimes {
                    bump(&stats.generic_named);
                }
                if tx.send(item).is_err() {
                    break;
                }
            }
            Err(_) => {
                bump(&stats.no_timestamp);
                progress.advance();
            }
        }
    }
    Ok(())
}

fn run_move_stage(
    mover: Mover,
    rx: Receiver<MediaFile>,
    tx: Sender<MediaFile>,
    stats: Arc<RunStats>,
    progress: ProgressTracker,
    cancel: CancellationToken,
) -> Result<()> {
    for mut item in rx.iter() {
        if cancel.is_cancelled() {
            continue;
        }
        let Some(target) = item.suggestion.clone() else {
            continue;
        };

        let moved = mover.move_item(&mut item, &target.directory, &target.file_name);
        progress.advance();

        match moved {
            Ok(_) => {
                bump(&stats.moved);
                if tx.send(item).is_err() {
                    break;
                }
            }
            Err(_) => bump(&stats.move_failures),
        }
    }
    Ok(())
}

/// Drains every moved item, even after cancellation, so no moved file is
/// left out of the catalog.
fn run_register_stage(
    mut registrar: Registrar,
    rx: Receiver<MediaFile>,
    stats: Arc<RunStats>,
) -> Result<()> {
    for item in rx.iter() {
        let written = registrar.push(&item)?;
        stats.registered.fetch_add(written, Ordering::Relaxed);
    }

    let total = registrar.finish()?;
    stats.registered.store(total, Ordering::Relaxed);
    Ok(())
}
