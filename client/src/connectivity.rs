//! Connectivity monitor.
//!
//! Tracks whether the remote store is believed reachable. The host feeds it
//! with platform online/offline events, and an optional [`ConnectivityProbe`]
//! loop can feed it with active checks. Listeners only ever see real
//! transitions: repeating the current state is not an event.

use crate::shutdown::ShutdownSignal;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A change of the online flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Transition {
    CameOnline,
    WentOffline,
}

/// Published connectivity state.
///
/// `reconnects` counts offline-to-online transitions, so a listener that
/// misses an intermediate offline period still notices the reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityState {
    pub online: bool,
    pub reconnects: u64,
}

/// Shared online/offline flag.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<ConnectivityState>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(ConnectivityState {
            online: initially_online,
            reconnects: 0,
        });
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn is_online(&self) -> bool {
        self.state.borrow().online
    }

    pub fn state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    /// Record the current reachability. Returns the transition, if any.
    pub fn set_online(&self, online: bool) -> Option<Transition> {
        let mut transition = None;
        self.state.send_if_modified(|state| {
            if state.online == online {
                return false;
            }
            state.online = online;
            if online {
                state.reconnects += 1;
                transition = Some(Transition::CameOnline);
            } else {
                transition = Some(Transition::WentOffline);
            }
            true
        });

        match transition {
            Some(Transition::CameOnline) => tracing::info!("Connectivity restored"),
            Some(Transition::WentOffline) => tracing::info!("Connectivity lost"),
            None => {}
        }
        transition
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }
}

/// Active reachability check of the remote store.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// Periodically probe the remote store and feed the monitor.
///
/// The first probe runs immediately.
pub fn spawn_probe_loop(
    monitor: ConnectivityMonitor,
    probe: Arc<dyn ConnectivityProbe>,
    period: Duration,
    mut shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticks.tick() => {
                    let reachable = probe.probe().await;
                    monitor.set_online(reachable);
                }
            }
        }
        tracing::debug!("Connectivity probe stopped");
    })
}
