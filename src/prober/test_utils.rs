//! Scripted prober for exercising the refresh engine without a network.

use futures::future::{self, BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{NodeConnection, NodeProber};
use crate::error::ProbeError;
use crate::types::ConnectionTarget;

/// How a scripted node reacts to a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeBehavior {
    /// Connects and answers immediately
    Succeed,
    /// Connection is refused
    Refuse,
    /// Connects but the round-trip fails
    FailPing,
    /// Connection attempt never completes
    Hang,
    /// Connects but the round-trip never completes
    HangPing,
    /// Connects and answers after the given delay
    Delay(Duration),
}

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicUsize,
    opened: AtomicUsize,
    released: AtomicUsize,
}

/// Prober whose nodes behave as scripted, keyed by `(host, port)`.
#[derive(Debug, Clone)]
pub struct ScriptedProber {
    behaviors: Arc<HashMap<(String, u16), ProbeBehavior>>,
    fallback: ProbeBehavior,
    counters: Arc<Counters>,
}

impl ScriptedProber {
    /// Every unscripted node gets `fallback`.
    pub fn new(fallback: ProbeBehavior) -> Self {
        Self {
            behaviors: Arc::new(HashMap::new()),
            fallback,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn with_node(mut self, host: impl Into<String>, port: u16, behavior: ProbeBehavior) -> Self {
        Arc::make_mut(&mut self.behaviors).insert((host.into(), port), behavior);
        self
    }

    /// Number of `connect` calls made so far.
    pub fn attempts(&self) -> usize {
        self.counters.attempts.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet released.
    pub fn open_connections(&self) -> usize {
        self.opened() - self.released()
    }

    fn behavior_for(&self, target: &ConnectionTarget) -> ProbeBehavior {
        self.behaviors
            .get(&(target.host().to_string(), target.port()))
            .copied()
            .unwrap_or(self.fallback)
    }
}

impl NodeProber for ScriptedProber {
    type Connection = ScriptedConnection;

    fn connect(&self, target: &ConnectionTarget) -> BoxFuture<'static, Result<ScriptedConnection, ProbeError>> {
        self.counters.attempts.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior_for(target);
        let counters = self.counters.clone();
        let addr = target.socket_addr();

        async move {
            match behavior {
                ProbeBehavior::Refuse => {
                    return Err(ProbeError::Connect(format!("{}: connection refused", addr)))
                }
                ProbeBehavior::Hang => future::pending::<()>().await,
                _ => {}
            }
            Ok(ScriptedConnection::open(behavior, counters))
        }
        .boxed()
    }
}

/// Connection handed out by [`ScriptedProber`]; counts itself released on drop.
#[derive(Debug)]
pub struct ScriptedConnection {
    behavior: ProbeBehavior,
    counters: Arc<Counters>,
}

impl ScriptedConnection {
    fn open(behavior: ProbeBehavior, counters: Arc<Counters>) -> Self {
        counters.opened.fetch_add(1, Ordering::SeqCst);
        Self { behavior, counters }
    }
}

impl NodeConnection for ScriptedConnection {
    fn ping(&mut self) -> BoxFuture<'_, Result<(), ProbeError>> {
        let behavior = self.behavior;
        async move {
            match behavior {
                ProbeBehavior::FailPing => Err(ProbeError::Protocol("ERR scripted failure".to_string())),
                ProbeBehavior::HangPing => future::pending().await,
                ProbeBehavior::Delay(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
                _ => Ok(()),
            }
        }
        .boxed()
    }

    fn close(self) -> BoxFuture<'static, ()> {
        drop(self);
        future::ready(()).boxed()
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}
