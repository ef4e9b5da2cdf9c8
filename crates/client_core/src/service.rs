//! In-process command service and typed request helpers.

use anyhow::Result;
use async_trait::async_trait;
use command_api::ApiContext;
use shared::{
    domain::{ActiveSnapshot, Character, Group},
    error::ApiError,
    protocol::{CommandReply, CommandRequest},
};
use storage::Storage;

use crate::{error::ClientError, CommandService};

/// Runs commands directly against a local [`Storage`].
#[derive(Clone)]
pub struct LocalCommandService {
    ctx: ApiContext,
}

impl LocalCommandService {
    pub fn new(storage: Storage) -> Self {
        Self {
            ctx: ApiContext::new(storage),
        }
    }

    pub async fn open(database_url: &str) -> Result<Self> {
        Ok(Self::new(Storage::new(database_url).await?))
    }
}

#[async_trait]
impl CommandService for LocalCommandService {
    async fn execute(&self, request: CommandRequest) -> Result<CommandReply, ApiError> {
        command_api::dispatch(&self.ctx, request).await
    }
}

pub(crate) async fn request_groups(
    service: &dyn CommandService,
    request: CommandRequest,
) -> Result<Vec<Group>, ClientError> {
    let command = request.name();
    match send(service, request).await? {
        CommandReply::Groups(groups) => Ok(groups),
        other => Err(unexpected(command, &other)),
    }
}

pub(crate) async fn request_pool(
    service: &dyn CommandService,
    request: CommandRequest,
) -> Result<Vec<Character>, ClientError> {
    let command = request.name();
    match send(service, request).await? {
        CommandReply::Pool(pool) => Ok(pool),
        other => Err(unexpected(command, &other)),
    }
}

pub(crate) async fn request_active(
    service: &dyn CommandService,
    request: CommandRequest,
) -> Result<ActiveSnapshot, ClientError> {
    let command = request.name();
    match send(service, request).await? {
        CommandReply::Active(snapshot) => Ok(snapshot),
        other => Err(unexpected(command, &other)),
    }
}

async fn send(
    service: &dyn CommandService,
    request: CommandRequest,
) -> Result<CommandReply, ClientError> {
    let command = request.name();
    tracing::debug!(command, "sending command");
    service
        .execute(request)
        .await
        .map_err(|source| ClientError::CommandFailed { command, source })
}

fn unexpected(command: &'static str, reply: &CommandReply) -> ClientError {
    let kind = match reply {
        CommandReply::Groups(_) => "groups",
        CommandReply::Pool(_) => "pool",
        CommandReply::Active(_) => "active snapshot",
    };
    ClientError::CommandFailed {
        command,
        source: ApiError::internal(format!("unexpected {kind} reply")),
    }
}
