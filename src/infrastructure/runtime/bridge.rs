//! Runtime bridge - connects the sync TUI thread with the async Tokio runtime
//!
//! Commands go over an unbounded tokio channel to a worker thread that owns the
//! runtime; every finished task posts its [`Message`] back over a std channel that
//! the UI loop drains without blocking.

use std::sync::mpsc::{self, Receiver};
use std::thread;

use anyhow::{Context, Result};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::debug;

use crate::core::{Message, Services, TaskFn};
use crate::infrastructure::runtime::worker::run_worker;
use crate::logging::LogHandle;

/// Work sent from the TUI to the async worker
pub enum RuntimeCommand {
    Run { label: String, run: TaskFn },
    Shutdown,
}

pub struct RuntimeBridge {
    cmd_tx: UnboundedSender<RuntimeCommand>,
    msg_rx: Receiver<Message>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RuntimeBridge {
    pub fn new(services: Services, log: LogHandle) -> Result<Self> {
        let (cmd_tx, cmd_rx) = unbounded_channel::<RuntimeCommand>();
        let (msg_tx, msg_rx) = mpsc::channel::<Message>();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("itemdeck-worker")
            .enable_all()
            .build()
            .context("failed to create tokio runtime")?;

        let handle = thread::Builder::new()
            .name("itemdeck-runtime".into())
            .spawn(move || {
                let _log = tracing::dispatcher::set_default(log.dispatch());
                runtime.block_on(run_worker(services, cmd_rx, msg_tx, log));
            })
            .context("failed to spawn runtime thread")?;

        Ok(Self {
            cmd_tx,
            msg_rx,
            handle: Some(handle),
        })
    }

    pub fn submit(&self, label: String, run: TaskFn) -> Result<()> {
        debug!(%label, "submitting task");
        self.cmd_tx
            .send(RuntimeCommand::Run { label, run })
            .map_err(|_| anyhow::anyhow!("worker channel closed"))
    }

    /// Drain finished messages (non-blocking)
    pub fn poll_messages(&self) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(message) = self.msg_rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

impl Drop for RuntimeBridge {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(RuntimeCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
