//! Task coordination: cooperative shutdown and the start-up barrier.

use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

/// Receiving side of the shutdown signal, cloned into every periodic task.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Sending side, held by the process wiring.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // no receivers left means every task already exited
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is triggered or the trigger is dropped.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleeps for `period`. Returns false if shutdown arrived first.
    pub async fn wait_interval(&mut self, period: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(period) => true,
            _ = self.wait() => false,
        }
    }
}

/// Fired by a task once it has completed its first successful cycle.
#[derive(Debug)]
pub struct ReadySignal {
    label: String,
    tx: Option<oneshot::Sender<()>>,
}

impl ReadySignal {
    /// Returns true only on the first call.
    pub fn fire(&mut self) -> bool {
        match self.tx.take() {
            Some(tx) => {
                let _ = tx.send(());
                debug!("{} is ready", self.label);
                true
            }
            None => false,
        }
    }

    pub fn is_fired(&self) -> bool {
        self.tx.is_none()
    }
}

/// Collects one readiness signal per registered task.
#[derive(Debug, Default)]
pub struct StartupBarrier {
    pending: Vec<(String, oneshot::Receiver<()>)>,
}

impl StartupBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, label: impl Into<String>) -> ReadySignal {
        let label = label.into();
        let (tx, rx) = oneshot::channel();
        self.pending.push((label.clone(), rx));
        ReadySignal { label, tx: Some(tx) }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Waits for every registered task. A task that exits without firing is
    /// logged and does not block the others. Returns how many fired.
    pub async fn wait(self) -> usize {
        let total = self.pending.len();
        let mut ready = 0;
        for (label, rx) in self.pending {
            match rx.await {
                Ok(()) => ready += 1,
                Err(_) => warn!("⚠️ {} stopped before becoming ready", label),
            }
        }
        info!("✅ Start-up barrier released ({}/{} ready)", ready, total);
        ready
    }
}
