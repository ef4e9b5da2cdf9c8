//! Command handlers backing the group switcher.
//!
//! Every mutation returns the full, freshly read collection of groups so
//! callers can replace their cached state wholesale.

use shared::{
    domain::{ActiveSnapshot, Breed, Character, Group, GroupId, Side},
    error::ApiError,
    membership::{self, Change, MembershipError},
    protocol::{CommandReply, CommandRequest},
};
use storage::Storage;
use tracing::{debug, info, warn};

pub const MIN_GROUP_NAME_LEN: usize = 3;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

pub async fn dispatch(ctx: &ApiContext, request: CommandRequest) -> Result<CommandReply, ApiError> {
    let command = request.name();
    debug!(command, mutation = request.is_mutation(), "handling command");

    let reply = match request {
        CommandRequest::ListGroups => list_groups(ctx).await.map(CommandReply::Groups),
        CommandRequest::ListAvailable => list_available(ctx).await.map(CommandReply::Pool),
        CommandRequest::ListActive => list_active(ctx).await.map(CommandReply::Active),
        CommandRequest::CreateGroup { name } => {
            create_group(ctx, &name).await.map(CommandReply::Groups)
        }
        CommandRequest::DeleteGroup { id } => delete_group(ctx, id).await.map(CommandReply::Groups),
        CommandRequest::AddMember { id, name } => {
            add_member(ctx, id, &name).await.map(CommandReply::Groups)
        }
        CommandRequest::AddMemberAt {
            id,
            name,
            anchor,
            side,
        } => add_member_at(ctx, id, &name, &anchor, side)
            .await
            .map(CommandReply::Groups),
        CommandRequest::RemoveMember { id, index } => {
            remove_member(ctx, id, index).await.map(CommandReply::Groups)
        }
        CommandRequest::SetMemberEnabled { id, index, value } => {
            set_member_enabled(ctx, id, index, value)
                .await
                .map(CommandReply::Groups)
        }
        CommandRequest::SetBreed { name, breed } => {
            set_breed(ctx, &name, breed).await.map(CommandReply::Groups)
        }
        CommandRequest::FocusGroup { id } => focus_group(ctx, id).await.map(CommandReply::Active),
        CommandRequest::RegisterCharacter { name } => {
            register_character(ctx, &name).await.map(CommandReply::Pool)
        }
    };

    if let Err(err) = &reply {
        warn!(command, code = ?err.code, message = %err.message, "command rejected");
    }
    reply
}

pub async fn list_groups(ctx: &ApiContext) -> Result<Vec<Group>, ApiError> {
    ctx.storage.list_groups().await.map_err(internal)
}

pub async fn list_available(ctx: &ApiContext) -> Result<Vec<Character>, ApiError> {
    ctx.storage.list_characters().await.map_err(internal)
}

/// The focused group's whole membership, disabled members included, so that
/// indices in the snapshot are member indices of that group.
pub async fn list_active(ctx: &ApiContext) -> Result<ActiveSnapshot, ApiError> {
    let focus = ctx.storage.focus().await.map_err(internal)?;
    let characters = ctx
        .storage
        .members(focus)
        .await
        .map_err(internal)?
        .unwrap_or_default();
    Ok(ActiveSnapshot::new(focus, characters))
}

pub async fn create_group(ctx: &ApiContext, name: &str) -> Result<Vec<Group>, ApiError> {
    let name = name.trim();
    if name.chars().count() < MIN_GROUP_NAME_LEN {
        return Err(ApiError::validation(format!(
            "group name must be at least {MIN_GROUP_NAME_LEN} characters"
        )));
    }

    let had_groups = ctx.storage.group_count().await.map_err(internal)? > 0;
    if !ctx.storage.create_group(name).await.map_err(internal)? {
        return Err(ApiError::conflict(format!("group '{name}' already exists")));
    }

    // the new group takes position 0; keep the focus on the group it pointed at
    if had_groups {
        let focus = ctx.storage.focus().await.map_err(internal)?;
        ctx.storage
            .set_focus(GroupId(focus.0 + 1))
            .await
            .map_err(internal)?;
    }

    info!(group = name, "group created");
    list_groups(ctx).await
}

pub async fn delete_group(ctx: &ApiContext, id: GroupId) -> Result<Vec<Group>, ApiError> {
    let deleted = ctx.storage.delete_group(id).await.map_err(internal)?;
    if !deleted {
        return Err(missing_group(id));
    }

    let focus = ctx.storage.focus().await.map_err(internal)?;
    let next_focus = if focus.0 > id.0 {
        GroupId(focus.0 - 1)
    } else if focus == id {
        GroupId(0)
    } else {
        focus
    };
    if next_focus != focus {
        ctx.storage.set_focus(next_focus).await.map_err(internal)?;
    }

    info!(group = id.0, "group deleted");
    list_groups(ctx).await
}

pub async fn add_member(ctx: &ApiContext, id: GroupId, name: &str) -> Result<Vec<Group>, ApiError> {
    let mut members = load_members(ctx, id).await?;
    let character = pool_character(ctx, name).await?;

    if membership::append(&mut members, character).is_applied() {
        store_members(ctx, id, &members).await?;
    }
    list_groups(ctx).await
}

pub async fn add_member_at(
    ctx: &ApiContext,
    id: GroupId,
    name: &str,
    anchor: &str,
    side: Side,
) -> Result<Vec<Group>, ApiError> {
    let mut members = load_members(ctx, id).await?;
    let character = pool_character(ctx, name).await?;

    let change = membership::insert_relative(&mut members, character, anchor, side)
        .map_err(membership_error)?;
    if change.is_applied() {
        store_members(ctx, id, &members).await?;
    }
    list_groups(ctx).await
}

pub async fn remove_member(
    ctx: &ApiContext,
    id: GroupId,
    index: usize,
) -> Result<Vec<Group>, ApiError> {
    let mut members = load_members(ctx, id).await?;
    membership::remove_at(&mut members, index).map_err(membership_error)?;
    store_members(ctx, id, &members).await?;
    list_groups(ctx).await
}

pub async fn set_member_enabled(
    ctx: &ApiContext,
    id: GroupId,
    index: usize,
    value: bool,
) -> Result<Vec<Group>, ApiError> {
    let mut members = load_members(ctx, id).await?;
    let change = membership::set_enabled(&mut members, index, value).map_err(membership_error)?;
    if change == Change::Applied {
        store_members(ctx, id, &members).await?;
    }
    list_groups(ctx).await
}

/// Breeds live in the pool, so every group containing `name` picks up the change.
pub async fn set_breed(ctx: &ApiContext, name: &str, breed: Breed) -> Result<Vec<Group>, ApiError> {
    let name = required_name(name)?;
    ctx.storage.set_breed(name, breed).await.map_err(internal)?;
    info!(character = name, %breed, "breed assigned");
    list_groups(ctx).await
}

pub async fn focus_group(ctx: &ApiContext, id: GroupId) -> Result<ActiveSnapshot, ApiError> {
    let count = ctx.storage.group_count().await.map_err(internal)?;
    if id.0 >= count {
        return Err(missing_group(id));
    }
    ctx.storage.set_focus(id).await.map_err(internal)?;
    list_active(ctx).await
}

pub async fn register_character(ctx: &ApiContext, name: &str) -> Result<Vec<Character>, ApiError> {
    let name = required_name(name)?;
    if ctx.storage.register_character(name).await.map_err(internal)? {
        info!(character = name, "character registered");
    }
    list_available(ctx).await
}

async fn load_members(ctx: &ApiContext, id: GroupId) -> Result<Vec<Character>, ApiError> {
    ctx.storage
        .members(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| missing_group(id))
}

async fn store_members(ctx: &ApiContext, id: GroupId, members: &[Character]) -> Result<(), ApiError> {
    if !membership::has_unique_names(members) {
        return Err(ApiError::internal(format!(
            "refusing to store duplicate members for group {}",
            id.0
        )));
    }
    ctx.storage
        .replace_members(id, members)
        .await
        .map_err(internal)
}

/// Fresh membership record for `name`, carrying the pool breed when known.
async fn pool_character(ctx: &ApiContext, name: &str) -> Result<Character, ApiError> {
    let name = required_name(name)?;
    let pool = list_available(ctx).await?;
    let breed = pool
        .into_iter()
        .find(|character| character.name == name)
        .and_then(|character| character.breed);
    Ok(Character {
        name: name.to_string(),
        breed,
        enabled: true,
    })
}

fn required_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("character name is required"));
    }
    Ok(name)
}

fn missing_group(id: GroupId) -> ApiError {
    ApiError::not_found(format!("group {} does not exist", id.0))
}

fn membership_error(err: MembershipError) -> ApiError {
    match err {
        MembershipError::AnchorMissing(_) => ApiError::not_found(err.to_string()),
        MembershipError::IndexOutOfRange { .. } => ApiError::validation(err.to_string()),
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::internal(format!("{err:#}"))
}

#[cfg(test)]
mod tests {
    use shared::error::ErrorCode;

    use super::*;

    async fn setup() -> ApiContext {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        ApiContext::new(storage)
    }

    fn member_names(groups: &[Group], index: usize) -> Vec<&str> {
        groups[index].member_names()
    }

    #[tokio::test]
    async fn create_returns_single_empty_group() {
        let ctx = setup().await;
        let groups = create_group(&ctx, "Team").await.expect("create");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "Team");
        assert!(groups[0].characters.is_empty());
    }

    #[tokio::test]
    async fn create_rejects_short_and_duplicate_names() {
        let ctx = setup().await;
        let err = create_group(&ctx, "ab").await.expect_err("too short");
        assert_eq!(err.code, ErrorCode::Validation);

        create_group(&ctx, "Team").await.expect("create");
        let err = create_group(&ctx, "Team").await.expect_err("duplicate");
        assert_eq!(err.code, ErrorCode::Conflict);
        assert_eq!(list_groups(&ctx).await.expect("groups").len(), 1);
    }

    #[tokio::test]
    async fn duplicate_name_conflict_leaves_order_and_focus() {
        let ctx = setup().await;
        create_group(&ctx, "Alpha").await.expect("alpha");
        create_group(&ctx, "Bravo").await.expect("bravo");
        focus_group(&ctx, GroupId(1)).await.expect("focus alpha");

        // storage rejects the name inside its insert transaction
        let err = create_group(&ctx, " Alpha ").await.expect_err("duplicate");
        assert_eq!(err.code, ErrorCode::Conflict);

        let groups = list_groups(&ctx).await.expect("groups");
        let names: Vec<_> = groups.iter().map(|group| group.name.as_str()).collect();
        assert_eq!(names, ["Bravo", "Alpha"]);
        assert_eq!(list_active(&ctx).await.expect("active").focus, GroupId(1));
    }

    #[tokio::test]
    async fn append_then_insert_before_then_remove() {
        let ctx = setup().await;
        create_group(&ctx, "Team").await.expect("create");

        let groups = add_member(&ctx, GroupId(0), "Iop1").await.expect("append");
        assert_eq!(member_names(&groups, 0), ["Iop1"]);

        let groups = add_member_at(&ctx, GroupId(0), "Iop2", "Iop1", Side::Before)
            .await
            .expect("insert");
        assert_eq!(member_names(&groups, 0), ["Iop2", "Iop1"]);

        let groups = remove_member(&ctx, GroupId(0), 0).await.expect("remove");
        assert_eq!(member_names(&groups, 0), ["Iop1"]);
    }

    #[tokio::test]
    async fn duplicate_append_returns_unchanged_snapshot() {
        let ctx = setup().await;
        create_group(&ctx, "Team").await.expect("create");
        add_member(&ctx, GroupId(0), "Iop1").await.expect("append");
        let groups = add_member(&ctx, GroupId(0), "Iop1").await.expect("again");
        assert_eq!(member_names(&groups, 0), ["Iop1"]);
    }

    #[tokio::test]
    async fn insert_with_unknown_anchor_keeps_prior_member() {
        let ctx = setup().await;
        create_group(&ctx, "Team").await.expect("create");
        add_member(&ctx, GroupId(0), "Iop1").await.expect("append");

        let err = add_member_at(&ctx, GroupId(0), "Iop1", "Ghost", Side::After)
            .await
            .expect_err("unknown anchor");
        assert_eq!(err.code, ErrorCode::NotFound);
        let groups = list_groups(&ctx).await.expect("groups");
        assert_eq!(member_names(&groups, 0), ["Iop1"]);
    }

    #[tokio::test]
    async fn out_of_range_member_index_is_a_validation_error() {
        let ctx = setup().await;
        create_group(&ctx, "Team").await.expect("create");
        let err = remove_member(&ctx, GroupId(0), 0).await.expect_err("empty");
        assert_eq!(err.code, ErrorCode::Validation);
        let err = set_member_enabled(&ctx, GroupId(0), 2, false)
            .await
            .expect_err("empty");
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn missing_group_is_not_found() {
        let ctx = setup().await;
        let err = add_member(&ctx, GroupId(3), "Iop1").await.expect_err("no group");
        assert_eq!(err.code, ErrorCode::NotFound);
        let err = delete_group(&ctx, GroupId(0)).await.expect_err("no group");
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn enabled_flag_is_per_membership() {
        let ctx = setup().await;
        create_group(&ctx, "Alpha").await.expect("alpha");
        create_group(&ctx, "Bravo").await.expect("bravo");
        add_member(&ctx, GroupId(0), "Iop1").await.expect("bravo member");
        add_member(&ctx, GroupId(1), "Iop1").await.expect("alpha member");

        let groups = set_member_enabled(&ctx, GroupId(0), 0, false)
            .await
            .expect("disable");
        assert!(!groups[0].characters[0].enabled);
        assert!(groups[1].characters[0].enabled);
    }

    #[tokio::test]
    async fn breed_change_reaches_pool_and_every_group() {
        let ctx = setup().await;
        create_group(&ctx, "Alpha").await.expect("alpha");
        create_group(&ctx, "Bravo").await.expect("bravo");
        add_member(&ctx, GroupId(0), "Iop1").await.expect("bravo member");
        add_member(&ctx, GroupId(1), "Iop1").await.expect("alpha member");

        let groups = set_breed(&ctx, "Iop1", Breed::Cra).await.expect("breed");
        assert!(groups
            .iter()
            .all(|group| group.characters[0].breed == Some(Breed::Cra)));
        let pool = list_available(&ctx).await.expect("pool");
        assert_eq!(pool[0].name, "Iop1");
        assert_eq!(pool[0].breed, Some(Breed::Cra));
    }

    #[tokio::test]
    async fn focus_follows_its_group_across_create_and_delete() {
        let ctx = setup().await;
        create_group(&ctx, "Alpha").await.expect("alpha");
        add_member(&ctx, GroupId(0), "Iop1").await.expect("member");
        let active = focus_group(&ctx, GroupId(0)).await.expect("focus");
        assert_eq!(active.characters.len(), 1);

        create_group(&ctx, "Bravo").await.expect("bravo");
        let active = list_active(&ctx).await.expect("active");
        assert_eq!(active.focus, GroupId(1));
        assert_eq!(active.characters[0].name, "Iop1");

        delete_group(&ctx, GroupId(0)).await.expect("delete bravo");
        let active = list_active(&ctx).await.expect("active");
        assert_eq!(active.focus, GroupId(0));
        assert_eq!(active.characters[0].name, "Iop1");

        delete_group(&ctx, GroupId(0)).await.expect("delete alpha");
        let active = list_active(&ctx).await.expect("active");
        assert_eq!(active, ActiveSnapshot::default());
    }

    #[tokio::test]
    async fn focusing_a_missing_group_fails() {
        let ctx = setup().await;
        let err = focus_group(&ctx, GroupId(0)).await.expect_err("no groups");
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn dispatch_routes_requests_to_handlers() {
        let ctx = setup().await;
        let reply = dispatch(&ctx, CommandRequest::CreateGroup { name: "Team".into() })
            .await
            .expect("create");
        assert!(matches!(reply, CommandReply::Groups(ref groups) if groups.len() == 1));

        let reply = dispatch(&ctx, CommandRequest::RegisterCharacter { name: "Cra1".into() })
            .await
            .expect("register");
        assert_eq!(reply, CommandReply::Pool(vec![Character::new("Cra1")]));

        let err = dispatch(&ctx, CommandRequest::DeleteGroup { id: GroupId(4) })
            .await
            .expect_err("missing");
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
