//! Single-queue driver for the coordinator
//!
//! One task owns the [`Coordinator`] and drains a bounded mpsc queue; callers
//! hold a cloneable [`ControlHandle`] and get replies over oneshot channels.
//! Every read-modify-write of the configuration record runs to completion
//! before the next command is taken off the queue.

use log::{debug, warn};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::coordinator::{ControlError, Coordinator};
use crate::engine::FilterEngine;
use crate::protocol::{Request, Response};
use crate::store::KeyValueStore;

/// Error reaching the coordinator task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActorError {
    #[error("Coordinator has shut down")]
    Closed,
    #[error("Coordinator dropped the reply")]
    Dropped,
}

/// Commands accepted by the coordinator task
#[derive(Debug)]
enum Command {
    /// Raw control-plane message
    Message {
        msg: Value,
        reply: oneshot::Sender<Response>,
    },
    /// Already-parsed control-plane request
    Request {
        request: Request,
        reply: oneshot::Sender<Response>,
    },
    /// A block rule matched; no reply
    RuleMatched { session_id: Option<i64> },
    /// Keyboard shortcut
    Shortcut {
        name: String,
        reply: oneshot::Sender<Option<Response>>,
    },
    Installed {
        reply: oneshot::Sender<Result<(), ControlError>>,
    },
    Startup {
        reply: oneshot::Sender<Result<(), ControlError>>,
    },
}

/// Handle to the coordinator task.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    command_tx: mpsc::Sender<Command>,
}

impl ControlHandle {
    /// Answer a raw control-plane message.
    pub async fn send_message(&self, msg: Value) -> Result<Response, ActorError> {
        self.call(|reply| Command::Message { msg, reply }).await
    }

    pub async fn request(&self, request: Request) -> Result<Response, ActorError> {
        self.call(|reply| Command::Request { request, reply }).await
    }

    /// Queue a match notification. Returns once it is queued, not applied.
    pub async fn rule_matched(&self, session_id: Option<i64>) -> Result<(), ActorError> {
        self.command_tx
            .send(Command::RuleMatched { session_id })
            .await
            .map_err(|_| ActorError::Closed)
    }

    pub async fn shortcut(&self, name: impl Into<String>) -> Result<Option<Response>, ActorError> {
        let name = name.into();
        self.call(|reply| Command::Shortcut { name, reply }).await
    }

    pub async fn installed(&self) -> Result<Result<(), ControlError>, ActorError> {
        self.call(|reply| Command::Installed { reply }).await
    }

    pub async fn startup(&self) -> Result<Result<(), ControlError>, ActorError> {
        self.call(|reply| Command::Startup { reply }).await
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| ActorError::Closed)?;
        reply_rx.await.map_err(|_| ActorError::Dropped)
    }
}

/// Move the coordinator onto its own task. The task ends when every handle
/// is dropped and hands the coordinator back through the join handle.
pub fn spawn_coordinator<K, E>(
    mut coordinator: Coordinator<K, E>,
    capacity: usize,
) -> (ControlHandle, JoinHandle<Coordinator<K, E>>)
where
    K: KeyValueStore,
    E: FilterEngine,
{
    let (command_tx, mut command_rx) = mpsc::channel(capacity.max(1));

    let task = tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            run(&mut coordinator, command).await;
        }
        debug!("Control queue closed");
        coordinator
    });

    (ControlHandle { command_tx }, task)
}

async fn run<K: KeyValueStore, E: FilterEngine>(coordinator: &mut Coordinator<K, E>, command: Command) {
    // A caller that gave up waiting is not an error for the coordinator
    match command {
        Command::Message { msg, reply } => {
            let _ = reply.send(coordinator.dispatch(&msg).await);
        }
        Command::Request { request, reply } => {
            let _ = reply.send(coordinator.handle(request).await);
        }
        Command::RuleMatched { session_id } => {
            if let Err(e) = coordinator.rule_matched(session_id).await {
                warn!("Failed to persist hit count: {}", e);
            }
        }
        Command::Shortcut { name, reply } => {
            let _ = reply.send(coordinator.on_shortcut(&name).await);
        }
        Command::Installed { reply } => {
            let _ = reply.send(coordinator.on_installed().await);
        }
        Command::Startup { reply } => {
            let _ = reply.send(coordinator.on_startup().await);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use cs_compiler::TemplateSet;

    use super::*;
    use crate::engine::MemoryEngine;
    use crate::protocol::StateReply;
    use crate::settings::BackgroundSettings;
    use crate::store::MemoryStore;

    fn spawn() -> (ControlHandle, JoinHandle<Coordinator<MemoryStore, MemoryEngine>>) {
        let coordinator = Coordinator::new(
            &BackgroundSettings::default(),
            TemplateSet::builtin(),
            MemoryStore::new(),
            MemoryEngine::new(),
        );
        spawn_coordinator(coordinator, 16)
    }

    async fn state(handle: &ControlHandle, session: i64) -> StateReply {
        match handle
            .send_message(json!({ "cmd": "getState", "sessionId": session, "site": "x.com" }))
            .await
            .unwrap()
        {
            Response::State(reply) => reply,
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn concurrent_toggles_lose_no_updates() {
        let (handle, task) = spawn();
        handle.installed().await.unwrap().unwrap();

        let sites: Vec<String> = (0..25).map(|i| format!("site{}.example", i)).collect();
        let calls = sites.iter().map(|site| {
            let handle = handle.clone();
            let msg = json!({ "cmd": "toggleSite", "site": site, "block": false });
            tokio::spawn(async move { handle.send_message(msg).await })
        });
        for call in calls.collect::<Vec<_>>() {
            assert!(call.await.unwrap().unwrap().is_ok());
        }

        drop(handle);
        let coordinator = task.await.unwrap();
        let stored = coordinator.store().raw("cleanstream_state").unwrap();
        let allowlist = stored["allowlist"].as_array().unwrap();
        assert_eq!(allowlist.len(), sites.len());
        for site in &sites {
            assert!(allowlist.contains(&json!(site)));
        }
        let rules = coordinator.engine().active_rules();
        assert!(rules.iter().all(|r| r.excluded_domains.len() == sites.len()));
    }

    #[tokio::test]
    async fn concurrent_hits_are_all_counted() {
        let (handle, _task) = spawn();
        handle.installed().await.unwrap().unwrap();
        handle.request(Request::ResetCounts).await.unwrap();

        let hits = (0..40).map(|i| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.rule_matched(Some(i % 2)).await })
        });
        for hit in hits.collect::<Vec<_>>() {
            hit.await.unwrap().unwrap();
        }

        // Queued after every hit, so it observes all of them
        let s = state(&handle, 0).await;
        assert_eq!(s.total_blocked, 40);
        assert_eq!(s.session_blocked, 20);
    }

    #[tokio::test]
    async fn shortcut_goes_through_the_queue() {
        let (handle, _task) = spawn();
        handle.startup().await.unwrap().unwrap();

        let reply = handle.shortcut("toggle-enabled").await.unwrap().unwrap();
        assert_eq!(reply.to_value(), json!({ "ok": true, "enabled": false }));
        assert!(!state(&handle, 1).await.enabled);
        assert_eq!(handle.shortcut("unbound").await.unwrap(), None);
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (handle, task) = spawn();
        task.abort();
        let _ = task.await;
        assert_eq!(
            handle.request(Request::ResetCounts).await.unwrap_err(),
            ActorError::Closed
        );
    }
}
