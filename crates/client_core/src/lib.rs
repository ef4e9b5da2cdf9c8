use async_trait::async_trait;
use shared::{
    error::ApiError,
    protocol::{CommandReply, CommandRequest},
};

pub mod board;
pub mod config;
pub mod error;
pub mod mirror;
pub mod service;

pub use board::{DragSource, DropTarget, GroupBoard};
pub use error::ClientError;
pub use mirror::{ActiveMirror, MirrorHandle, MirrorState, ResizeEffect, SyncOutcome};
pub use service::LocalCommandService;

/// Request/response boundary to the backend that owns all group data.
#[async_trait]
pub trait CommandService: Send + Sync {
    async fn execute(&self, request: CommandRequest) -> Result<CommandReply, ApiError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use super::*;

    /// Answers from a queue of canned replies and records every request.
    #[derive(Default)]
    pub struct ScriptedService {
        replies: Mutex<VecDeque<Result<CommandReply, ApiError>>>,
        fallback: Mutex<Option<Result<CommandReply, ApiError>>>,
        pub requests: Mutex<Vec<CommandRequest>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, reply: Result<CommandReply, ApiError>) {
            self.replies.lock().expect("replies").push_back(reply);
        }

        /// Reply used once the queue is drained.
        pub fn repeat(&self, reply: Result<CommandReply, ApiError>) {
            *self.fallback.lock().expect("fallback") = Some(reply);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn request_names(&self) -> Vec<&'static str> {
            self.requests
                .lock()
                .expect("requests")
                .iter()
                .map(CommandRequest::name)
                .collect()
        }
    }

    #[async_trait]
    impl CommandService for ScriptedService {
        async fn execute(&self, request: CommandRequest) -> Result<CommandReply, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().expect("requests").push(request);
            if let Some(reply) = self.replies.lock().expect("replies").pop_front() {
                return reply;
            }
            self.fallback
                .lock()
                .expect("fallback")
                .clone()
                .unwrap_or_else(|| Err(ApiError::internal("no scripted reply")))
        }
    }
}
