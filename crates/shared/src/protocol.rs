use serde::{Deserialize, Serialize};

use crate::domain::{ActiveSnapshot, Breed, Character, Group, GroupId, Side};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum CommandRequest {
    ListGroups,
    ListAvailable,
    ListActive,
    CreateGroup {
        name: String,
    },
    DeleteGroup {
        id: GroupId,
    },
    AddMember {
        id: GroupId,
        name: String,
    },
    AddMemberAt {
        id: GroupId,
        name: String,
        anchor: String,
        side: Side,
    },
    RemoveMember {
        id: GroupId,
        index: usize,
    },
    SetMemberEnabled {
        id: GroupId,
        index: usize,
        value: bool,
    },
    SetBreed {
        name: String,
        breed: Breed,
    },
    FocusGroup {
        id: GroupId,
    },
    RegisterCharacter {
        name: String,
    },
}

impl CommandRequest {
    pub fn name(&self) -> &'static str {
        match self {
            CommandRequest::ListGroups => "list_groups",
            CommandRequest::ListAvailable => "list_available",
            CommandRequest::ListActive => "list_active",
            CommandRequest::CreateGroup { .. } => "create_group",
            CommandRequest::DeleteGroup { .. } => "delete_group",
            CommandRequest::AddMember { .. } => "add_member",
            CommandRequest::AddMemberAt { .. } => "add_member_at",
            CommandRequest::RemoveMember { .. } => "remove_member",
            CommandRequest::SetMemberEnabled { .. } => "set_member_enabled",
            CommandRequest::SetBreed { .. } => "set_breed",
            CommandRequest::FocusGroup { .. } => "focus_group",
            CommandRequest::RegisterCharacter { .. } => "register_character",
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            CommandRequest::ListGroups | CommandRequest::ListAvailable | CommandRequest::ListActive
        )
    }
}

/// Canonical state returned for a [`CommandRequest`]; always a whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum CommandReply {
    Groups(Vec<Group>),
    Pool(Vec<Character>),
    Active(ActiveSnapshot),
}
