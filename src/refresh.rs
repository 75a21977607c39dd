//! Topology Refresh
//!
//! Confirms which candidate nodes are reachable within one deadline:
//! - Probes every candidate concurrently
//! - Enforces a single deadline for the whole call
//! - Assembles the snapshot in candidate order, independent of completion order
//!
//! Probe results land in index-addressed slots of a shared board. A result
//! counts only if it is recorded strictly before the deadline instant; one
//! landing exactly on the deadline or later is discarded, whatever the order
//! in which the engine and the probe tasks get scheduled.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

use crate::error::{ProbeError, Result};
use crate::prober::{NodeConnection, NodeProber};
use crate::source::CandidateSource;
use crate::types::{ConnectionTarget, NodeDescriptor, TopologySnapshot};

/// Lifecycle of a single probe within one refresh.
#[derive(Debug, Clone)]
enum ProbeOutcome {
    Pending,
    Succeeded(Duration),
    Failed(ProbeError),
}

#[derive(Debug)]
struct BoardState {
    outcomes: Vec<ProbeOutcome>,
    pending: usize,
    sealed: bool,
}

/// Shared result accumulator of one refresh call.
#[derive(Debug)]
struct ProbeBoard {
    state: Mutex<BoardState>,
    all_resolved: Notify,
    /// `None` when the deadline lies beyond what `Instant` can represent
    expires_at: Option<Instant>,
}

impl ProbeBoard {
    fn new(probes: usize, expires_at: Option<Instant>) -> Self {
        Self {
            state: Mutex::new(BoardState {
                outcomes: vec![ProbeOutcome::Pending; probes],
                pending: probes,
                sealed: false,
            }),
            all_resolved: Notify::new(),
            expires_at,
        }
    }

    /// Record the terminal outcome of slot `index`.
    ///
    /// Returns false when the board is sealed, the deadline instant has been
    /// reached, or the slot already resolved.
    fn resolve(&self, index: usize, outcome: ProbeOutcome) -> bool {
        let mut state = self.state.lock();
        let expired = self.expires_at.is_some_and(|at| Instant::now() >= at);
        if state.sealed || expired || !matches!(state.outcomes[index], ProbeOutcome::Pending) {
            return false;
        }
        state.outcomes[index] = outcome;
        state.pending -= 1;
        if state.pending == 0 {
            self.all_resolved.notify_waiters();
        }
        true
    }

    fn pending(&self) -> usize {
        self.state.lock().pending
    }

    async fn wait_all(&self) {
        loop {
            // Created before the check so a concurrent notify_waiters is not missed
            let notified = self.all_resolved.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting results and hand out the final outcomes.
    fn seal(&self) -> Vec<ProbeOutcome> {
        let mut state = self.state.lock();
        state.sealed = true;
        std::mem::take(&mut state.outcomes)
    }
}

/// Per-candidate result, as reported to diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeResult {
    Succeeded { latency: Duration },
    Failed { reason: String },
    TimedOut,
}

impl From<ProbeOutcome> for ProbeResult {
    fn from(outcome: ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Pending => ProbeResult::TimedOut,
            ProbeOutcome::Succeeded(latency) => ProbeResult::Succeeded { latency },
            ProbeOutcome::Failed(e) => ProbeResult::Failed { reason: e.to_string() },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub node: NodeDescriptor,
    pub result: ProbeResult,
}

/// Snapshot plus the per-candidate detail of the refresh that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub refresh_id: Uuid,
    pub snapshot: TopologySnapshot,
    /// One entry per unique candidate, in candidate order
    pub probes: Vec<ProbeReport>,
    /// Candidates dropped because an earlier one had the same address
    pub duplicates: usize,
    pub elapsed: Duration,
}

/// Stateless topology refresh engine.
///
/// Holds nothing but the prober; every call starts from scratch.
#[derive(Debug)]
pub struct TopologyRefresh<P> {
    prober: Arc<P>,
}

impl<P> Clone for TopologyRefresh<P> {
    fn clone(&self) -> Self {
        Self {
            prober: self.prober.clone(),
        }
    }
}

impl<P: NodeProber> TopologyRefresh<P> {
    pub fn new(prober: P) -> Self {
        Self {
            prober: Arc::new(prober),
        }
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Reachable subset of `candidates`, confirmed within `deadline`.
    ///
    /// A node is included only if its liveness check completed strictly
    /// before the deadline instant. A deadline too large to represent waits
    /// for every check to resolve. Dropping the returned future cancels the
    /// checks still in flight.
    ///
    /// Fails only when a candidate is malformed, before any probe starts.
    pub async fn refresh(&self, candidates: &[NodeDescriptor], deadline: Duration) -> Result<TopologySnapshot> {
        Ok(self.refresh_with_report(candidates, deadline).await?.snapshot)
    }

    /// Lists candidates from `source` once and refreshes them, using the
    /// seed's configured timeout as the deadline.
    pub async fn get_nodes<S>(&self, source: &S, seed: &ConnectionTarget) -> Result<TopologySnapshot>
    where
        S: CandidateSource + ?Sized,
    {
        let candidates = source.list_candidates()?;
        self.refresh(&candidates, seed.timeout()).await
    }

    /// Blocking variant for callers outside an async context.
    ///
    /// Panics when called from within a tokio runtime.
    pub fn blocking_refresh(&self, candidates: &[NodeDescriptor], deadline: Duration) -> Result<TopologySnapshot> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.refresh(candidates, deadline))
    }

    pub async fn refresh_with_report(&self, candidates: &[NodeDescriptor], deadline: Duration) -> Result<RefreshReport> {
        for candidate in candidates {
            if let Err(e) = candidate.validate() {
                warn!("Rejecting refresh: {}", e);
                return Err(e);
            }
        }

        let unique = unique_candidates(candidates);
        let refresh_id = Uuid::new_v4();
        let span = info_span!("topology_refresh", %refresh_id, candidates = unique.len());

        let report = self
            .probe_all(refresh_id, unique, deadline)
            .instrument(span)
            .await;
        Ok(RefreshReport {
            duplicates: candidates.len() - report.probes.len(),
            ..report
        })
    }

    async fn probe_all(&self, refresh_id: Uuid, nodes: Vec<NodeDescriptor>, deadline: Duration) -> RefreshReport {
        let started = Instant::now();

        if nodes.is_empty() || deadline.is_zero() {
            debug!("Nothing can complete: {} candidates, deadline {:?}", nodes.len(), deadline);
            return build_report(refresh_id, nodes, Vec::new(), started.elapsed());
        }

        let expires_at = started.checked_add(deadline);
        let board = Arc::new(ProbeBoard::new(nodes.len(), expires_at));
        let cancel = CancellationToken::new();
        // Spawned tasks outlive this future when the caller drops it mid-wait
        let _cancel_on_drop = cancel.clone().drop_guard();

        for (index, node) in nodes.iter().enumerate() {
            let prober = self.prober.clone();
            let board = board.clone();
            let cancel = cancel.child_token();
            let target = node.target().clone();

            tokio::spawn(
                async move {
                    let probe_started = Instant::now();
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            trace!("Probe of {} abandoned", target);
                            return;
                        }
                        result = probe_node(&*prober, &target) => result,
                    };

                    let outcome = match result {
                        Ok(()) => {
                            debug!("{} answered in {:?}", target, probe_started.elapsed());
                            ProbeOutcome::Succeeded(probe_started.elapsed())
                        }
                        Err(e) => {
                            debug!("{} unreachable: {}", target, e);
                            ProbeOutcome::Failed(e)
                        }
                    };

                    if !board.resolve(index, outcome) {
                        trace!("Discarding late result for {}", target);
                    }
                }
                .in_current_span(),
            );
        }

        match expires_at {
            Some(expires_at) => {
                if tokio::time::timeout_at(expires_at, board.wait_all()).await.is_err() {
                    debug!("Deadline of {:?} elapsed with {} probes outstanding", deadline, board.pending());
                }
            }
            None => {
                debug!("Deadline of {:?} is unbounded, waiting for every probe", deadline);
                board.wait_all().await;
            }
        }

        let outcomes = board.seal();
        cancel.cancel();

        let report = build_report(refresh_id, nodes, outcomes, started.elapsed());
        info!(
            "Topology refreshed: {}/{} nodes reachable in {:?}",
            report.snapshot.len(),
            report.probes.len(),
            report.elapsed
        );
        report
    }
}

/// Connect, round-trip, release.
async fn probe_node<P: NodeProber>(prober: &P, target: &ConnectionTarget) -> std::result::Result<(), ProbeError> {
    let mut connection = prober.connect(target).await?;
    let result = connection.ping().await;
    connection.close().await;
    result
}

/// First occurrence of each `(host, port)` wins.
fn unique_candidates(candidates: &[NodeDescriptor]) -> Vec<NodeDescriptor> {
    let mut seen = HashSet::with_capacity(candidates.len());
    candidates
        .iter()
        .filter(|node| seen.insert(node.key()))
        .cloned()
        .collect()
}

/// Slots missing from `outcomes` count as still pending.
fn build_report(
    refresh_id: Uuid,
    nodes: Vec<NodeDescriptor>,
    outcomes: Vec<ProbeOutcome>,
    elapsed: Duration,
) -> RefreshReport {
    let mut outcomes = outcomes.into_iter();
    let probes: Vec<ProbeReport> = nodes
        .into_iter()
        .map(|node| ProbeReport {
            node,
            result: outcomes.next().unwrap_or(ProbeOutcome::Pending).into(),
        })
        .collect();

    let live = probes
        .iter()
        .filter(|p| matches!(p.result, ProbeResult::Succeeded { .. }))
        .map(|p| p.node.clone())
        .collect();

    RefreshReport {
        refresh_id,
        snapshot: TopologySnapshot::new(live),
        probes,
        duplicates: 0,
        elapsed,
    }
}
