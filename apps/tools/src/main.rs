use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use client_core::config::{load_settings, prepare_database_url};
use command_api::ApiContext;
use shared::{
    domain::{Breed, GroupId, Side},
    protocol::CommandRequest,
};
use storage::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides the configured database url.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every group with its ordered members.
    Groups,
    /// Print the available character pool.
    Pool,
    /// Print the active snapshot mirrored to the observer.
    Active,
    Create {
        name: String,
    },
    Delete {
        group: usize,
    },
    Register {
        name: String,
    },
    Add {
        group: usize,
        name: String,
    },
    /// Insert or move NAME before or after ANCHOR.
    Insert {
        group: usize,
        name: String,
        anchor: String,
        #[arg(long, default_value = "before")]
        side: Side,
    },
    Remove {
        group: usize,
        index: usize,
    },
    Enable {
        group: usize,
        index: usize,
        #[arg(action = ArgAction::Set)]
        value: bool,
    },
    Breed {
        name: String,
        breed: Breed,
    },
    Focus {
        group: usize,
    },
}

impl Command {
    fn into_request(self) -> CommandRequest {
        match self {
            Command::Groups => CommandRequest::ListGroups,
            Command::Pool => CommandRequest::ListAvailable,
            Command::Active => CommandRequest::ListActive,
            Command::Create { name } => CommandRequest::CreateGroup { name },
            Command::Delete { group } => CommandRequest::DeleteGroup { id: GroupId(group) },
            Command::Register { name } => CommandRequest::RegisterCharacter { name },
            Command::Add { group, name } => CommandRequest::AddMember {
                id: GroupId(group),
                name,
            },
            Command::Insert {
                group,
                name,
                anchor,
                side,
            } => CommandRequest::AddMemberAt {
                id: GroupId(group),
                name,
                anchor,
                side,
            },
            Command::Remove { group, index } => CommandRequest::RemoveMember {
                id: GroupId(group),
                index,
            },
            Command::Enable {
                group,
                index,
                value,
            } => CommandRequest::SetMemberEnabled {
                id: GroupId(group),
                index,
                value,
            },
            Command::Breed { name, breed } => CommandRequest::SetBreed { name, breed },
            Command::Focus { group } => CommandRequest::FocusGroup { id: GroupId(group) },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let raw_url = cli
        .database_url
        .unwrap_or_else(|| load_settings().database_url);
    let database_url = prepare_database_url(&raw_url);
    let storage = Storage::new(&database_url).await?;
    storage.health_check().await?;
    let ctx = ApiContext::new(storage);

    let reply = command_api::dispatch(&ctx, cli.command.into_request()).await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);

    Ok(())
}
