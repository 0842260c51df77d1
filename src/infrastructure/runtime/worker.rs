//! Async worker - runs inside the Tokio runtime and executes commands

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::mpsc::Sender;

use futures::FutureExt;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error};

use crate::core::{Message, Services, TaskFn};
use crate::infrastructure::runtime::bridge::RuntimeCommand;
use crate::logging::LogHandle;

/// Run the worker loop until shutdown or until the bridge is dropped.
pub async fn run_worker(
    services: Services,
    mut cmd_rx: UnboundedReceiver<RuntimeCommand>,
    msg_tx: Sender<Message>,
    log: LogHandle,
) {
    while let Some(command) = cmd_rx.recv().await {
        match command {
            RuntimeCommand::Shutdown => break,
            RuntimeCommand::Run { label, run } => {
                let services = services.clone();
                let msg_tx = msg_tx.clone();
                tokio::spawn(
                    async move {
                        let message = run_task(label, run, services).await;
                        let _ = msg_tx.send(message);
                    }
                    .with_subscriber(log.dispatch().clone()),
                );
            }
        }
    }
    debug!("worker stopped");
}

/// Run one task; a panic becomes `TaskFailed` so the loop always gets a reply.
pub async fn run_task(label: String, run: TaskFn, services: Services) -> Message {
    debug!(%label, "task started");
    match AssertUnwindSafe(async move { run(services).await })
        .catch_unwind()
        .await
    {
        Ok(message) => {
            debug!(%label, message = message.name(), "task finished");
            message
        }
        Err(panic) => {
            let error = panic_message(panic.as_ref());
            error!(%label, %error, "task panicked");
            Message::TaskFailed { label, error }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "task panicked".to_string())
}
