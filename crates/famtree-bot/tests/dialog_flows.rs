use std::sync::Arc;

use chrono::Duration;
use famtree_bot::dialog::{DEFAULT_GENERATION_LIMIT, MAIN_MENU_TEXT};
use famtree_bot::{Engine, LockManager};
use famtree_db::Database;
use famtree_types::{Gender, Member, RelationType, Role};

const OWNER: &str = "+1111111111";
const SECOND: &str = "+2222222222";
const THIRD: &str = "+3333333333";

fn engine() -> Engine {
    engine_with(LockManager::default())
}

fn engine_with(locks: LockManager) -> Engine {
    let db = Arc::new(Database::open_in_memory().unwrap());
    Engine::new(db, locks, DEFAULT_GENERATION_LIMIT)
}

fn send(engine: &Engine, phone: &str, body: &str) -> String {
    engine.handle_message(phone, body).joined()
}

fn send_all(engine: &Engine, phone: &str, bodies: &[&str]) -> String {
    let mut last = String::new();
    for body in bodies {
        last = send(engine, phone, body);
    }
    last
}

fn user_id(engine: &Engine, phone: &str) -> i64 {
    engine.database().get_user_by_phone(phone).unwrap().unwrap().id
}

fn stored_state(engine: &Engine, phone: &str) -> (Option<String>, Option<String>) {
    let user = engine.database().get_user_by_phone(phone).unwrap().unwrap();
    (user.current_state, user.state_data)
}

fn owner_members(engine: &Engine) -> Vec<Member> {
    let db = engine.database();
    let tree = db.get_tree_by_owner(user_id(engine, OWNER)).unwrap().unwrap();
    db.list_members(tree.id).unwrap()
}

fn member_named(engine: &Engine, name: &str) -> Member {
    owner_members(engine).into_iter().find(|m| m.name == name).unwrap()
}

fn add_root(engine: &Engine, name: &str) {
    let reply = send_all(engine, OWNER, &["2", name, "01-01-1990", "Female", "skip"]);
    assert!(reply.contains(&format!("Added {name} to the tree")), "{reply}");
}

/// Add `name` related to `relative` via kinship menu `choice`.
fn add_related(engine: &Engine, phone: &str, name: &str, gender: &str, relative: &Member, choice: &str) -> String {
    send_all(engine, phone, &["2", name, "05-05-2015", gender, "skip"]);
    send(engine, phone, &relative.id.to_string());
    send(engine, phone, choice)
}

#[test]
fn greeting_shows_main_menu() {
    let engine = engine();
    let reply = send(&engine, OWNER, "Hi");
    assert!(reply.contains("Family Tree Bot"));
    assert_eq!(reply, MAIN_MENU_TEXT);
}

#[test]
fn unknown_menu_input_is_rejected() {
    let engine = engine();
    assert_eq!(send(&engine, OWNER, "9"), "Invalid option. Send 'menu' to see options.");
    assert!(send(&engine, OWNER, "7").contains("Send 'reset' anytime"));
}

#[test]
fn first_member_creates_tree_at_generation_one() {
    let engine = engine();
    assert!(send(&engine, OWNER, "Hi").contains("Family Tree Bot"));
    add_root(&engine, "Alice");

    let members = owner_members(&engine);
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].generation_level, 1);
    assert_eq!(members[0].gender, Gender::Female);
    assert_eq!(members[0].phone, None);
    assert_eq!(stored_state(&engine, OWNER).0.as_deref(), Some("MAIN_MENU"));
}

#[test]
fn child_lands_one_generation_below_relative() {
    let engine = engine();
    add_root(&engine, "Alice");
    let alice = member_named(&engine, "Alice");

    send_all(&engine, OWNER, &["2", "Bob", "05-05-2015", "Male", "+44 7700 900123"]);
    let prompt = send(&engine, OWNER, &alice.id.to_string());
    assert!(prompt.contains("1. Mother"), "{prompt}");
    let reply = send(&engine, OWNER, "3");
    assert!(reply.contains("Added Bob to the tree"), "{reply}");

    let bob = member_named(&engine, "Bob");
    assert_eq!(bob.generation_level, 2);
    assert_eq!(bob.phone.as_deref(), Some("+447700900123"));

    let rels = engine.database().list_relationships(bob.tree_id).unwrap();
    assert_eq!(rels.len(), 1);
    assert_eq!((rels[0].parent_id, rels[0].child_id), (alice.id, bob.id));
    assert_eq!(rels[0].relation_type, RelationType::Parent);
}

#[test]
fn relative_list_shows_generations() {
    let engine = engine();
    add_root(&engine, "Alice");
    let alice = member_named(&engine, "Alice");
    let prompt = send_all(&engine, OWNER, &["2", "Bob", "05-05-2015", "Male", "skip"]);
    assert!(prompt.contains(&format!("{}. Alice (Gen 1)", alice.id)), "{prompt}");
}

#[test]
fn sister_shares_recorded_parents() {
    let engine = engine();
    add_root(&engine, "Alice");
    let alice = member_named(&engine, "Alice");
    add_related(&engine, OWNER, "Bob", "Male", &alice, "3");
    let bob = member_named(&engine, "Bob");

    // Gender typed as Male, but "Sister" implies female.
    let reply = add_related(&engine, OWNER, "Carol", "Male", &bob, "6");
    assert!(reply.contains("Added Carol"), "{reply}");
    let carol = member_named(&engine, "Carol");
    assert_eq!(carol.gender, Gender::Female);
    assert_eq!(carol.generation_level, 2);

    let rels = engine.database().list_relationships(carol.tree_id).unwrap();
    assert!(rels.iter().all(|r| r.relation_type != RelationType::Sibling));
    assert!(rels.iter().any(|r| r.parent_id == alice.id && r.child_id == carol.id));
}

#[test]
fn placement_outside_generation_limit_reprompts() {
    let engine = engine();
    add_root(&engine, "Alice");
    let alice = member_named(&engine, "Alice");

    // A mother of a generation-1 member would sit at generation 0.
    let reply = add_related(&engine, OWNER, "Eve", "Female", &alice, "1");
    assert!(reply.contains("allows generations 1-4"), "{reply}");
    assert_eq!(stored_state(&engine, OWNER).0.as_deref(), Some("ADD_MEMBER_RELATION_TYPE"));
    assert_eq!(owner_members(&engine).len(), 1);

    let reply = send(&engine, OWNER, "4");
    assert!(reply.contains("Added Eve"), "{reply}");
    assert_eq!(member_named(&engine, "Eve").generation_level, 1);
}

#[test]
fn invalid_date_reprompts_same_step() {
    let engine = engine();
    send_all(&engine, OWNER, &["2", "Ann"]);
    let reply = send(&engine, OWNER, "1990-01-01");
    assert_eq!(reply, "Invalid date format. Please use DD-MM-YYYY.");
    let (state, data) = stored_state(&engine, OWNER);
    assert_eq!(state.as_deref(), Some("ADD_MEMBER_DOB"));
    assert!(data.unwrap().contains("Ann"));

    assert!(send(&engine, OWNER, "31-12-1989").contains("Gender"));
    assert!(send(&engine, OWNER, "robot").contains("Invalid gender"));
    assert_eq!(stored_state(&engine, OWNER).0.as_deref(), Some("ADD_MEMBER_GENDER"));
}

#[test]
fn viewer_cannot_add_members() {
    let engine = engine();
    add_root(&engine, "Alice");
    let reply = send_all(&engine, OWNER, &["4", SECOND]);
    assert!(reply.contains("Access granted to +2222222222 as Viewer"), "{reply}");

    let reply = send(&engine, SECOND, "2");
    assert!(reply.contains("You are a Viewer"), "{reply}");
    assert_eq!(owner_members(&engine).len(), 1);
    assert_eq!(stored_state(&engine, SECOND).0.as_deref(), Some("MAIN_MENU"));

    // Viewing is still allowed.
    assert!(send(&engine, SECOND, "1").contains("Alice (F), Gen 1"));
}

#[test]
fn editor_adds_to_shared_tree() {
    let engine = engine();
    add_root(&engine, "Alice");
    send_all(&engine, OWNER, &["4", "+2222222222 editor"]);
    let alice = member_named(&engine, "Alice");

    let reply = add_related(&engine, SECOND, "Bob", "Male", &alice, "3");
    assert!(reply.contains("Added Bob"), "{reply}");
    assert_eq!(owner_members(&engine).len(), 2);
    assert!(engine.database().get_tree_by_owner(user_id(&engine, SECOND)).unwrap().is_none());

    // Editors cannot administer the tree.
    assert!(send(&engine, SECOND, "6").contains("Only the Owner can delete the tree"));
}

#[test]
fn share_rejects_owner_role_and_self() {
    let engine = engine();
    add_root(&engine, "Alice");
    let reply = send_all(&engine, OWNER, &["4", "+2222222222 owner"]);
    assert!(reply.contains("only one owner"), "{reply}");
    assert_eq!(stored_state(&engine, OWNER).0.as_deref(), Some("SHARE_ENTER_PHONE"));

    let reply = send(&engine, OWNER, OWNER);
    assert!(reply.contains("cannot share the tree with yourself"), "{reply}");
}

#[test]
fn reset_always_returns_to_menu() {
    let engine = engine();
    add_root(&engine, "Alice");
    let flows: &[&[&str]] = &[
        &[],
        &["2"],
        &["2", "Bob", "01-01-2000"],
        &["3"],
        &["4"],
        &["6"],
        &["8", "1"],
    ];
    for steps in flows {
        send_all(&engine, OWNER, steps);
        for word in ["reset", "RESET", " Reset "] {
            assert_eq!(send(&engine, OWNER, word), MAIN_MENU_TEXT);
            assert_eq!(
                stored_state(&engine, OWNER),
                (Some("MAIN_MENU".to_string()), Some("{}".to_string()))
            );
        }
    }
}

#[test]
fn concurrent_edit_is_refused_until_released() {
    let engine = engine();
    add_root(&engine, "Alice");
    send_all(&engine, OWNER, &["4", "+2222222222 editor"]);
    let alice = member_named(&engine, "Alice");
    let id = alice.id.to_string();

    assert!(send_all(&engine, OWNER, &["3", &id]).contains("Editing Alice"));
    let reply = send_all(&engine, SECOND, &["3", &id]);
    assert!(reply.contains("currently being edited by another user"), "{reply}");

    let reply = send_all(&engine, OWNER, &["1", "Alicia"]);
    assert!(reply.contains("Member updated successfully"), "{reply}");
    assert_eq!(member_named(&engine, "Alicia").id, alice.id);

    assert!(send_all(&engine, SECOND, &["3", &id]).contains("Editing Alicia"));
}

#[test]
fn reset_releases_held_edit_lock() {
    let engine = engine();
    add_root(&engine, "Alice");
    send_all(&engine, OWNER, &["4", "+2222222222 editor"]);
    let id = member_named(&engine, "Alice").id.to_string();

    send_all(&engine, OWNER, &["3", &id, "2"]);
    send(&engine, OWNER, "reset");
    assert!(send_all(&engine, SECOND, &["3", &id]).contains("Editing Alice"));
}

#[test]
fn expired_lock_blocks_the_write() {
    let engine = engine_with(LockManager::new(Duration::zero()));
    add_root(&engine, "Alice");
    let id = member_named(&engine, "Alice").id.to_string();

    let reply = send_all(&engine, OWNER, &["3", &id, "1", "Mallory"]);
    assert!(reply.contains("no longer hold the edit lock"), "{reply}");
    assert!(owner_members(&engine).iter().all(|m| m.name == "Alice"));
    assert_eq!(stored_state(&engine, OWNER).0.as_deref(), Some("MAIN_MENU"));
}

#[test]
fn field_edits_validate_input() {
    let engine = engine();
    add_root(&engine, "Alice");
    let id = member_named(&engine, "Alice").id.to_string();

    send_all(&engine, OWNER, &["3", &id, "2"]);
    assert!(send(&engine, OWNER, "1/1/1991").contains("Invalid date format"));
    assert_eq!(stored_state(&engine, OWNER).0.as_deref(), Some("EDIT_ENTER_VALUE"));
    assert!(send(&engine, OWNER, "02-02-1991").contains("Member updated"));

    let alice = member_named(&engine, "Alice");
    assert_eq!(alice.dob.unwrap().to_string(), "1991-02-02");
    assert!(!alice.is_locked);
}

#[test]
fn relinking_moves_member_to_implied_generation() {
    let engine = engine();
    add_root(&engine, "Alice");
    let alice = member_named(&engine, "Alice");
    add_related(&engine, OWNER, "Bob", "Male", &alice, "3");
    add_related(&engine, OWNER, "Dan", "Male", &alice, "4");
    let bob = member_named(&engine, "Bob");
    let dan = member_named(&engine, "Dan");
    assert_eq!(dan.generation_level, 1);

    let prompt = send_all(&engine, OWNER, &["3", &dan.id.to_string(), "5"]);
    assert!(prompt.contains(&format!("{}. Bob (Gen 2)", bob.id)), "{prompt}");
    assert!(!prompt.contains(&format!("{}. Dan", dan.id)));

    send(&engine, OWNER, &bob.id.to_string());
    let reply = send(&engine, OWNER, "3");
    assert!(reply.contains("Relationship updated successfully"), "{reply}");

    let dan = member_named(&engine, "Dan");
    assert_eq!(dan.generation_level, 3);
    assert!(!dan.is_locked);
    let rels = engine.database().list_relationships(dan.tree_id).unwrap();
    assert!(rels.iter().any(|r| r.parent_id == bob.id
        && r.child_id == dan.id
        && r.relation_type == RelationType::Parent));
}

#[test]
fn relinking_respects_generation_limit() {
    let engine = engine();
    add_root(&engine, "Alice");
    let alice = member_named(&engine, "Alice");
    add_related(&engine, OWNER, "Bob", "Male", &alice, "3");
    let bob = member_named(&engine, "Bob");

    // Bob as Alice's father would be generation 0.
    let reply = send_all(&engine, OWNER, &["3", &bob.id.to_string(), "5", &alice.id.to_string(), "2"]);
    assert!(reply.contains("allows generations 1-4"), "{reply}");
    assert_eq!(stored_state(&engine, OWNER).0.as_deref(), Some("EDIT_RELATION_TYPE"));
    assert_eq!(member_named(&engine, "Bob").generation_level, 2);
}

#[test]
fn relinking_refuses_ancestry_loops() {
    let engine = engine();
    add_root(&engine, "Alice");
    let alice = member_named(&engine, "Alice");
    add_related(&engine, OWNER, "Bob", "Male", &alice, "3");
    let bob = member_named(&engine, "Bob");

    // Alice as Bob's child lands on generation 3, inside the limit.
    let reply = send_all(&engine, OWNER, &["3", &alice.id.to_string(), "5", &bob.id.to_string(), "3"]);
    assert!(reply.contains("their own ancestor"), "{reply}");
    assert_eq!(stored_state(&engine, OWNER).0.as_deref(), Some("EDIT_RELATION_TYPE"));

    let alice = member_named(&engine, "Alice");
    assert_eq!(alice.generation_level, 1);
    let rels = engine.database().list_relationships(alice.tree_id).unwrap();
    assert!(!rels.iter().any(|r| r.parent_id == bob.id && r.child_id == alice.id));

    send(&engine, OWNER, "reset");
    let view = send(&engine, OWNER, "1");
    assert!(view.contains("Alice (F), Gen 1"), "{view}");
    assert!(view.contains("└── Bob (M), Gen 2"), "{view}");
}

#[test]
fn transfer_demotes_previous_owner() {
    let engine = engine();
    add_root(&engine, "Alice");
    let reply = send_all(&engine, OWNER, &["5", THIRD]);
    assert!(reply.contains("Ownership transferred to +3333333333. You are now an Editor."), "{reply}");

    let db = engine.database();
    let tree = db.get_tree_by_owner(user_id(&engine, THIRD)).unwrap().unwrap();
    assert!(db.get_tree_by_owner(user_id(&engine, OWNER)).unwrap().is_none());
    assert_eq!(db.get_access_role(tree.id, user_id(&engine, OWNER)).unwrap(), Some(Role::Editor));

    assert!(send(&engine, OWNER, "6").contains("Only the Owner can delete the tree"));
    assert!(send(&engine, OWNER, "1").contains("Alice (F), Gen 1"));
}

#[test]
fn transfer_to_self_or_existing_owner_is_refused() {
    let engine = engine();
    add_root(&engine, "Alice");
    assert!(send_all(&engine, OWNER, &["5", OWNER]).contains("You already own this tree."));

    send_all(&engine, THIRD, &["2", "Zed", "01-01-1980", "m", "skip"]);
    let reply = send_all(&engine, OWNER, &["5", THIRD]);
    assert!(reply.contains("already owns a family tree"), "{reply}");
    assert!(engine.database().get_tree_by_owner(user_id(&engine, OWNER)).unwrap().is_some());
}

#[test]
fn delete_needs_confirmation() {
    let engine = engine();
    add_root(&engine, "Alice");
    assert!(send_all(&engine, OWNER, &["6", "no"]).contains("Deletion cancelled."));
    assert_eq!(owner_members(&engine).len(), 1);

    assert!(send_all(&engine, OWNER, &["6", "YES"]).contains("Tree deleted successfully"));
    assert!(engine.database().get_tree_by_owner(user_id(&engine, OWNER)).unwrap().is_none());
    assert_eq!(send(&engine, OWNER, "1"), "You don't have a tree yet. Select 'Add Member' to start!");
}

#[test]
fn events_are_added_and_listed() {
    let engine = engine();
    add_root(&engine, "Alice");
    let id = member_named(&engine, "Alice").id.to_string();

    let reply = send_all(&engine, OWNER, &["8", &id, "1", "Birthday"]);
    assert!(reply.contains("DD-MM-YYYY"), "{reply}");
    assert!(send(&engine, OWNER, "1st Jan").contains("Invalid date format"));
    let reply = send(&engine, OWNER, "01-01-1990 the first one");
    assert!(reply.contains("Added Birthday on 01-01-1990!"), "{reply}");

    let reply = send_all(&engine, OWNER, &["8", &id, "2"]);
    assert!(reply.contains("📅 01-01-1990: Birthday (the first one)"), "{reply}");
}

#[test]
fn viewers_can_list_but_not_add_events() {
    let engine = engine();
    add_root(&engine, "Alice");
    send_all(&engine, OWNER, &["4", SECOND]);
    let id = member_named(&engine, "Alice").id.to_string();

    let reply = send_all(&engine, SECOND, &["8", &id, "1"]);
    assert!(reply.contains("Only Owners and Editors can add events."), "{reply}");
    let reply = send_all(&engine, SECOND, &["8", &id, "2"]);
    assert!(reply.contains("No special dates found"), "{reply}");
}

#[test]
fn member_outside_active_tree_is_not_found() {
    let engine = engine();
    add_root(&engine, "Alice");
    send_all(&engine, THIRD, &["2", "Zed", "01-01-1980", "m", "skip"]);
    let alice = member_named(&engine, "Alice");

    let reply = send_all(&engine, THIRD, &["3", &alice.id.to_string()]);
    assert!(reply.contains("Member not found in your tree."), "{reply}");
}

#[test]
fn corrupt_persisted_state_falls_back_to_menu() {
    let engine = engine();
    send(&engine, OWNER, "hi");
    let id = user_id(&engine, OWNER);
    engine.database().save_dialog_state(id, "WARP_DRIVE", "{\"x\":1}").unwrap();

    assert_eq!(send(&engine, OWNER, "menu"), MAIN_MENU_TEXT);
    assert_eq!(stored_state(&engine, OWNER).0.as_deref(), Some("MAIN_MENU"));
}

#[test]
fn view_renders_family_outline() {
    let engine = engine();
    add_root(&engine, "Alice");
    let alice = member_named(&engine, "Alice");
    add_related(&engine, OWNER, "Bob", "Male", &alice, "3");

    let reply = send(&engine, OWNER, "1");
    assert!(reply.starts_with("🌳 *Your Family Tree* (2 members)"), "{reply}");
    assert!(reply.contains("Alice (F), Gen 1\n└── Bob (M), Gen 2"), "{reply}");
}
