//! Ordering rules for group membership sequences.
//!
//! Every rule works on a `Vec<Character>` in place and keeps the sequence free
//! of duplicate names. The backend applies these before persisting; clients
//! use [`available_for`] to derive the draggable pool.

use thiserror::Error;

use crate::domain::{Character, Group, Side};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MembershipError {
    #[error("anchor '{0}' is not a member of the group")]
    AnchorMissing(String),
    #[error("member index {index} out of range for {len} members")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Applied,
    Unchanged,
}

impl Change {
    pub fn is_applied(self) -> bool {
        self == Change::Applied
    }
}

/// Appends `character` unless a member with the same name already exists.
pub fn append(members: &mut Vec<Character>, character: Character) -> Change {
    if members.iter().any(|member| member.name == character.name) {
        return Change::Unchanged;
    }
    members.push(character);
    Change::Applied
}

/// Places `character` immediately before or after `anchor`.
///
/// A prior occurrence of the same name is taken out first and its membership
/// record (including `enabled`) is what gets re-inserted, so a drag inside a
/// group is a move. Dropping a character onto itself never changes order.
pub fn insert_relative(
    members: &mut Vec<Character>,
    character: Character,
    anchor: &str,
    side: Side,
) -> Result<Change, MembershipError> {
    if character.name == anchor {
        return Ok(Change::Unchanged);
    }
    let anchor_index = members
        .iter()
        .position(|member| member.name == anchor)
        .ok_or_else(|| MembershipError::AnchorMissing(anchor.to_string()))?;

    let prior = members
        .iter()
        .position(|member| member.name == character.name);
    let (record, anchor_index) = match prior {
        // removing an earlier occurrence shifts the anchor one slot left
        Some(prior) => (
            members.remove(prior),
            if prior < anchor_index {
                anchor_index - 1
            } else {
                anchor_index
            },
        ),
        None => (character, anchor_index),
    };
    let index = match side {
        Side::Before => anchor_index,
        Side::After => anchor_index + 1,
    };
    members.insert(index, record);

    if prior == Some(index) {
        Ok(Change::Unchanged)
    } else {
        Ok(Change::Applied)
    }
}

pub fn remove_at(members: &mut Vec<Character>, index: usize) -> Result<Character, MembershipError> {
    if index >= members.len() {
        return Err(MembershipError::IndexOutOfRange {
            index,
            len: members.len(),
        });
    }
    Ok(members.remove(index))
}

pub fn set_enabled(
    members: &mut [Character],
    index: usize,
    value: bool,
) -> Result<Change, MembershipError> {
    let len = members.len();
    let member = members
        .get_mut(index)
        .ok_or(MembershipError::IndexOutOfRange { index, len })?;
    if member.enabled == value {
        return Ok(Change::Unchanged);
    }
    member.enabled = value;
    Ok(Change::Applied)
}

/// Pool characters that are not members of `group`, in pool order.
pub fn available_for(group: &Group, pool: &[Character]) -> Vec<Character> {
    pool.iter()
        .filter(|candidate| !group.contains(&candidate.name))
        .cloned()
        .collect()
}

pub fn has_unique_names(members: &[Character]) -> bool {
    members
        .iter()
        .enumerate()
        .all(|(i, member)| !members[..i].iter().any(|other| other.name == member.name))
}

#[cfg(test)]
#[path = "tests/membership_tests.rs"]
mod tests;
