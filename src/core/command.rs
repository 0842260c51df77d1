//! Deferred work returned by tabs and the coordinator

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::message::{EditorPurpose, Message};
use crate::infrastructure::api::WorkItemApi;
use crate::store::TemplateStore;

/// Collaborators handed to every task when it runs
#[derive(Clone)]
pub struct Services {
    pub api: Arc<dyn WorkItemApi>,
    pub templates: TemplateStore,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("templates", &self.templates)
            .finish_non_exhaustive()
    }
}

pub type TaskFn = Box<dyn FnOnce(Services) -> BoxFuture<'static, Message> + Send>;

#[derive(Debug, Clone, PartialEq)]
pub struct EditorRequest {
    pub path: PathBuf,
    pub purpose: EditorPurpose,
}

pub enum Command {
    /// Async work on the runtime; its result is fed back into the loop.
    Task { label: String, run: TaskFn },
    /// Deliver a message on the next loop turn.
    Emit(Message),
    /// Suspend the terminal and run the external editor.
    Editor(EditorRequest),
    Batch(Vec<Command>),
}

impl Command {
    pub fn task<F, Fut>(label: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(Services) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Message> + Send + 'static,
    {
        Command::Task {
            label: label.into(),
            run: Box::new(move |services| f(services).boxed()),
        }
    }

    pub fn emit(message: Message) -> Self {
        Command::Emit(message)
    }

    /// Flatten nested batches, preserving order.
    pub fn flatten(self) -> Vec<Command> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(command) = stack.pop() {
            match command {
                Command::Batch(children) => stack.extend(children.into_iter().rev()),
                other => out.push(other),
            }
        }
        out
    }

    pub fn label(&self) -> &str {
        match self {
            Command::Task { label, .. } => label,
            Command::Emit(message) => message.name(),
            Command::Editor(_) => "editor",
            Command::Batch(_) => "batch",
        }
    }

    pub fn is_task(&self) -> bool {
        matches!(self, Command::Task { .. })
    }

    /// Run tasks inline and collect the messages they yield. Editor requests are
    /// returned as `EditorRequested` since there is no terminal to suspend.
    pub async fn execute(self, services: &Services) -> Vec<Message> {
        let mut messages = Vec::new();
        for command in self.flatten() {
            match command {
                Command::Task { run, .. } => messages.push(run(services.clone()).await),
                Command::Emit(message) => messages.push(message),
                Command::Editor(EditorRequest { path, purpose }) => {
                    messages.push(Message::EditorRequested { path, purpose })
                }
                Command::Batch(_) => {}
            }
        }
        messages
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Task { label, .. } => f.debug_struct("Task").field("label", label).finish(),
            Command::Emit(message) => f.debug_tuple("Emit").field(message).finish(),
            Command::Editor(request) => f.debug_tuple("Editor").field(request).finish(),
            Command::Batch(commands) => f.debug_tuple("Batch").field(commands).finish(),
        }
    }
}

/// Combine optional commands into one.
pub fn batch(commands: impl IntoIterator<Item = Option<Command>>) -> Option<Command> {
    let mut commands: Vec<Command> = commands.into_iter().flatten().collect();
    match commands.len() {
        0 => None,
        1 => commands.pop(),
        _ => Some(Command::Batch(commands)),
    }
}
