//! Interactive group board: cached groups, the character pool and the
//! drag-and-drop gestures that reorder memberships.
//!
//! The board never predicts the result of a gesture. It validates what it can
//! locally, sends one command, and replaces its cached groups with whatever
//! the command service returns.

use std::sync::Arc;

pub use command_api::MIN_GROUP_NAME_LEN;
use shared::{
    domain::{Breed, Character, Group, GroupId, Side},
    membership,
    protocol::CommandRequest,
};
use tracing::info;

use crate::{
    error::ClientError,
    service::{request_active, request_groups, request_pool},
    CommandService,
};

/// What is being dragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragSource {
    /// A character from the available pool.
    Pool { name: String },
    /// An existing member, identified by its position in the group.
    Member { index: usize, name: String },
}

impl DragSource {
    pub fn name(&self) -> &str {
        match self {
            DragSource::Pool { name } | DragSource::Member { name, .. } => name,
        }
    }
}

/// Where it was dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum DropTarget {
    /// The group's member list header: append at the end.
    Members,
    /// A member avatar, with the pointer x and the avatar's horizontal bounds.
    Member {
        anchor: String,
        pointer_x: f64,
        bounds_x: f64,
        bounds_width: f64,
    },
    /// The available pool header: remove the dragged member.
    Pool,
}

pub struct GroupBoard {
    service: Arc<dyn CommandService>,
    groups: Vec<Group>,
    pool: Vec<Character>,
    focused: GroupId,
    breed_dialog: Option<String>,
}

impl GroupBoard {
    pub fn new(service: Arc<dyn CommandService>) -> Self {
        Self {
            service,
            groups: Vec::new(),
            pool: Vec::new(),
            focused: GroupId(0),
            breed_dialog: None,
        }
    }

    /// Builds a board and fetches the current groups and pool.
    pub async fn load(service: Arc<dyn CommandService>) -> Result<Self, ClientError> {
        let mut board = Self::new(service);
        let groups = request_groups(board.service.as_ref(), CommandRequest::ListGroups).await?;
        board.adopt_groups(groups);
        board.refresh_pool().await?;
        Ok(board)
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.0)
    }

    pub fn pool(&self) -> &[Character] {
        &self.pool
    }

    pub fn focused(&self) -> GroupId {
        self.focused
    }

    pub fn focused_group(&self) -> Option<&Group> {
        self.group(self.focused)
    }

    /// Moves the local focus without contacting the command service.
    pub fn select(&mut self, id: GroupId) -> Result<(), ClientError> {
        self.require_group(id)?;
        self.focused = id;
        Ok(())
    }

    /// Pool characters that can still be dragged into `id`, derived on every call.
    pub fn available_for(&self, id: GroupId) -> Vec<Character> {
        match self.group(id) {
            Some(group) => membership::available_for(group, &self.pool),
            None => self.pool.clone(),
        }
    }

    pub fn breed_dialog(&self) -> Option<&str> {
        self.breed_dialog.as_deref()
    }

    pub fn open_breed_dialog(&mut self, name: impl Into<String>) {
        self.breed_dialog = Some(name.into());
    }

    pub fn close_breed_dialog(&mut self) {
        self.breed_dialog = None;
    }

    pub async fn create_group(&mut self, name: &str) -> Result<(), ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::rejected("group name is required"));
        }
        if name.chars().count() < MIN_GROUP_NAME_LEN {
            return Err(ClientError::rejected(format!(
                "group name must be at least {MIN_GROUP_NAME_LEN} characters"
            )));
        }

        let groups = request_groups(
            self.service.as_ref(),
            CommandRequest::CreateGroup {
                name: name.to_string(),
            },
        )
        .await?;
        self.adopt_groups(groups);
        self.focused = GroupId(0);
        info!(group = name, "group created");
        Ok(())
    }

    pub async fn delete_group(&mut self, id: GroupId) -> Result<(), ClientError> {
        self.require_group(id)?;
        let groups =
            request_groups(self.service.as_ref(), CommandRequest::DeleteGroup { id }).await?;
        self.adopt_groups(groups);
        self.focused = GroupId(0);
        info!(group = id.0, "group deleted");
        Ok(())
    }

    /// Adds `name` at the end of the group.
    pub async fn append(&mut self, id: GroupId, name: &str) -> Result<(), ClientError> {
        let group = self.require_group(id)?;
        if group.contains(name) {
            return Err(ClientError::rejected(format!(
                "'{name}' is already a member of '{}'",
                group.name
            )));
        }

        let groups = request_groups(
            self.service.as_ref(),
            CommandRequest::AddMember {
                id,
                name: name.to_string(),
            },
        )
        .await?;
        self.adopt_groups(groups);
        Ok(())
    }

    /// Inserts or moves `name` next to `anchor`.
    pub async fn insert_relative(
        &mut self,
        id: GroupId,
        name: &str,
        anchor: &str,
        side: Side,
    ) -> Result<(), ClientError> {
        self.require_group(id)?;
        if name == anchor {
            return Err(ClientError::rejected(format!("'{name}' dropped onto itself")));
        }

        let groups = request_groups(
            self.service.as_ref(),
            CommandRequest::AddMemberAt {
                id,
                name: name.to_string(),
                anchor: anchor.to_string(),
                side,
            },
        )
        .await?;
        self.adopt_groups(groups);
        Ok(())
    }

    pub async fn remove(&mut self, id: GroupId, index: usize) -> Result<(), ClientError> {
        self.require_member(id, index)?;
        let groups = request_groups(
            self.service.as_ref(),
            CommandRequest::RemoveMember { id, index },
        )
        .await?;
        self.adopt_groups(groups);
        Ok(())
    }

    pub async fn set_enabled(
        &mut self,
        id: GroupId,
        index: usize,
        value: bool,
    ) -> Result<(), ClientError> {
        self.require_member(id, index)?;
        let groups = request_groups(
            self.service.as_ref(),
            CommandRequest::SetMemberEnabled { id, index, value },
        )
        .await?;
        self.adopt_groups(groups);
        Ok(())
    }

    /// Click on a member avatar.
    pub async fn toggle_enabled(&mut self, id: GroupId, index: usize) -> Result<(), ClientError> {
        let enabled = self.require_member(id, index)?.enabled;
        self.set_enabled(id, index, !enabled).await
    }

    /// Assigns `breed` pool-wide, then refetches the pool so the available
    /// list shows it too.
    pub async fn set_breed(&mut self, name: &str, breed: Breed) -> Result<(), ClientError> {
        if name.trim().is_empty() {
            return Err(ClientError::rejected("character name is required"));
        }
        let groups = request_groups(
            self.service.as_ref(),
            CommandRequest::SetBreed {
                name: name.to_string(),
                breed,
            },
        )
        .await?;
        self.adopt_groups(groups);
        self.breed_dialog = None;
        self.refresh_pool().await
    }

    /// Focuses `id` for the observer surface and refetches the pool.
    ///
    /// The local focus moves only once the command service accepted the focus.
    pub async fn refresh(&mut self, id: GroupId) -> Result<(), ClientError> {
        self.require_group(id)?;
        let active =
            request_active(self.service.as_ref(), CommandRequest::FocusGroup { id }).await?;
        self.focused = id;
        info!(
            group = active.focus.0,
            members = active.len(),
            "observer focus updated"
        );
        self.refresh_pool().await
    }

    pub async fn refresh_pool(&mut self) -> Result<(), ClientError> {
        self.pool = request_pool(self.service.as_ref(), CommandRequest::ListAvailable).await?;
        Ok(())
    }

    /// Resolves a completed drag into the matching membership command.
    pub async fn handle_drop(
        &mut self,
        id: GroupId,
        source: DragSource,
        target: DropTarget,
    ) -> Result<(), ClientError> {
        match (source, target) {
            (DragSource::Pool { name }, DropTarget::Members) => self.append(id, &name).await,
            (
                source,
                DropTarget::Member {
                    anchor,
                    pointer_x,
                    bounds_x,
                    bounds_width,
                },
            ) => {
                let side = Side::from_pointer(pointer_x, bounds_x, bounds_width);
                self.insert_relative(id, source.name(), &anchor, side).await
            }
            (DragSource::Member { index, .. }, DropTarget::Pool) => self.remove(id, index).await,
            (DragSource::Member { name, .. }, DropTarget::Members) => Err(ClientError::rejected(
                format!("'{name}' is already a member; drop it on another member to move it"),
            )),
            (DragSource::Pool { name }, DropTarget::Pool) => Err(ClientError::rejected(format!(
                "'{name}' is already in the available pool"
            ))),
        }
    }

    fn adopt_groups(&mut self, groups: Vec<Group>) {
        self.groups = groups;
        if self.focused.0 >= self.groups.len() {
            self.focused = GroupId(0);
        }
        tracing::debug!(groups = self.groups.len(), "adopted group snapshot");
    }

    fn require_group(&self, id: GroupId) -> Result<&Group, ClientError> {
        self.group(id)
            .ok_or_else(|| ClientError::rejected(format!("group {} does not exist", id.0)))
    }

    fn require_member(&self, id: GroupId, index: usize) -> Result<&Character, ClientError> {
        let group = self.require_group(id)?;
        group.characters.get(index).ok_or_else(|| {
            ClientError::rejected(format!(
                "'{}' has no member at position {index}",
                group.name
            ))
        })
    }
}

#[cfg(test)]
#[path = "tests/board_tests.rs"]
mod tests;
