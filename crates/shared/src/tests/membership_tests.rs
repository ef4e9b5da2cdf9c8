use proptest::prelude::*;

use super::*;

fn members(names: &[&str]) -> Vec<Character> {
    names.iter().map(|name| Character::new(*name)).collect()
}

fn names(members: &[Character]) -> Vec<&str> {
    members.iter().map(|member| member.name.as_str()).collect()
}

#[test]
fn append_adds_to_end() {
    let mut group = members(&["Iop1"]);
    assert_eq!(append(&mut group, Character::new("Cra1")), Change::Applied);
    assert_eq!(names(&group), ["Iop1", "Cra1"]);
}

#[test]
fn append_ignores_existing_member() {
    let mut group = members(&["Iop1", "Cra1"]);
    assert_eq!(append(&mut group, Character::new("Iop1")), Change::Unchanged);
    assert_eq!(names(&group), ["Iop1", "Cra1"]);
}

#[test]
fn insert_before_anchor_from_pool() {
    let mut group = members(&["Iop1"]);
    let change = insert_relative(&mut group, Character::new("Iop2"), "Iop1", Side::Before)
        .expect("insert");
    assert_eq!(change, Change::Applied);
    assert_eq!(names(&group), ["Iop2", "Iop1"]);
}

#[test]
fn insert_after_anchor_lands_at_next_position() {
    let mut group = members(&["A", "B", "C"]);
    insert_relative(&mut group, Character::new("X"), "B", Side::After).expect("insert");
    assert_eq!(names(&group), ["A", "B", "X", "C"]);
}

#[test]
fn moving_forward_accounts_for_removed_prior_occurrence() {
    let mut group = members(&["A", "B", "C", "D"]);
    insert_relative(&mut group, Character::new("A"), "C", Side::After).expect("move");
    assert_eq!(names(&group), ["B", "C", "A", "D"]);
}

#[test]
fn moving_backward_places_before_anchor() {
    let mut group = members(&["A", "B", "C", "D"]);
    insert_relative(&mut group, Character::new("D"), "B", Side::Before).expect("move");
    assert_eq!(names(&group), ["A", "D", "B", "C"]);
}

#[test]
fn move_keeps_the_existing_membership_record() {
    let mut group = members(&["A", "B"]);
    group[1].enabled = false;
    insert_relative(&mut group, Character::new("B"), "A", Side::Before).expect("move");
    assert_eq!(names(&group), ["B", "A"]);
    assert!(!group[0].enabled);
}

#[test]
fn dropping_onto_itself_is_a_no_op() {
    let mut group = members(&["A", "B"]);
    let before = group.clone();
    let change =
        insert_relative(&mut group, Character::new("A"), "A", Side::After).expect("self drop");
    assert_eq!(change, Change::Unchanged);
    assert_eq!(group, before);
}

#[test]
fn dropping_next_to_current_position_reports_unchanged() {
    let mut group = members(&["A", "B"]);
    let change = insert_relative(&mut group, Character::new("A"), "B", Side::Before)
        .expect("same spot");
    assert_eq!(change, Change::Unchanged);
    assert_eq!(names(&group), ["A", "B"]);
}

#[test]
fn reinserting_at_the_current_slot_keeps_order_and_record() {
    let mut group = members(&["A", "B", "C"]);
    group[1].enabled = false;
    let before = group.clone();

    let change = insert_relative(&mut group, Character::new("B"), "A", Side::After)
        .expect("after previous");
    assert_eq!(change, Change::Unchanged);
    let change = insert_relative(&mut group, Character::new("B"), "C", Side::Before)
        .expect("before next");
    assert_eq!(change, Change::Unchanged);
    assert_eq!(group, before);

    let change =
        insert_relative(&mut group, Character::new("B"), "C", Side::After).expect("past next");
    assert_eq!(change, Change::Applied);
    assert_eq!(names(&group), ["A", "C", "B"]);
    assert!(!group[2].enabled);
}

#[test]
fn missing_anchor_leaves_sequence_untouched() {
    let mut group = members(&["A", "B"]);
    let err = insert_relative(&mut group, Character::new("A"), "Z", Side::After)
        .expect_err("anchor missing");
    assert_eq!(err, MembershipError::AnchorMissing("Z".into()));
    assert_eq!(names(&group), ["A", "B"]);
}

#[test]
fn remove_at_uses_position() {
    let mut group = members(&["Iop2", "Iop1"]);
    let removed = remove_at(&mut group, 0).expect("remove");
    assert_eq!(removed.name, "Iop2");
    assert_eq!(names(&group), ["Iop1"]);
    assert_eq!(
        remove_at(&mut group, 3),
        Err(MembershipError::IndexOutOfRange { index: 3, len: 1 })
    );
}

#[test]
fn set_enabled_does_not_reorder() {
    let mut group = members(&["A", "B", "C"]);
    assert_eq!(set_enabled(&mut group, 1, false), Ok(Change::Applied));
    assert_eq!(set_enabled(&mut group, 1, false), Ok(Change::Unchanged));
    assert_eq!(names(&group), ["A", "B", "C"]);
    assert!(!group[1].enabled);
    assert!(set_enabled(&mut group, 9, true).is_err());
}

#[test]
fn available_pool_excludes_members() {
    let group = Group {
        name: "Team".into(),
        characters: members(&["B"]),
    };
    let pool = members(&["A", "B", "C"]);
    assert_eq!(names(&available_for(&group, &pool)), ["A", "C"]);
}

#[derive(Debug, Clone)]
enum Op {
    Append(usize),
    Insert(usize, usize, bool),
    Remove(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..6).prop_map(Op::Append),
        (0usize..6, 0usize..6, any::<bool>()).prop_map(|(a, b, right)| Op::Insert(a, b, right)),
        (0usize..8).prop_map(Op::Remove),
    ]
}

const POOL: [&str; 6] = ["Iop1", "Iop2", "Cra1", "Feca1", "Sram1", "Xelor1"];

proptest! {
    /// No sequence of append/insert/move/remove ever yields a duplicate name.
    #[test]
    fn prop_membership_never_duplicates(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut group: Vec<Character> = Vec::new();
        for op in ops {
            match op {
                Op::Append(i) => {
                    append(&mut group, Character::new(POOL[i]));
                }
                Op::Insert(i, anchor, right) => {
                    let side = if right { Side::After } else { Side::Before };
                    let _ = insert_relative(&mut group, Character::new(POOL[i]), POOL[anchor], side);
                }
                Op::Remove(index) => {
                    let _ = remove_at(&mut group, index);
                }
            }
            prop_assert!(has_unique_names(&group), "duplicate in {:?}", names(&group));
        }
    }

    /// An after-insert lands directly behind the anchor wherever the mover came from.
    #[test]
    fn prop_after_insert_follows_anchor(len in 2usize..6, mover in 0usize..6, anchor in 0usize..6) {
        let mut group = members(&POOL[..len]);
        prop_assume!(mover != anchor && anchor < len);
        insert_relative(&mut group, Character::new(POOL[mover]), POOL[anchor], Side::After)
            .expect("anchor present");
        let anchor_at = group.iter().position(|m| m.name == POOL[anchor]).expect("anchor");
        prop_assert_eq!(group[anchor_at + 1].name.as_str(), POOL[mover]);
        prop_assert!(has_unique_names(&group));
    }
}
