//! Per-user conversation engine.
//!
//! Each inbound message loads the sender's persisted [`DialogState`], runs
//! exactly one handler for it, and stores the state that handler returns.
//! Handlers live in the submodules as `impl Session` blocks, one per flow.

mod add_member;
mod edit_member;
mod events;
mod menu;
mod sharing;
mod state;

use std::sync::Arc;

use anyhow::Result;
use famtree_db::Database;
use famtree_types::Member;
use tracing::{debug, error, info};

use crate::locks::LockManager;
use crate::reply::Reply;

pub use menu::{HELP_TEXT, MAIN_MENU_TEXT};
pub use state::{DialogState, EditField, MemberDraft};

pub const GENERIC_ERROR: &str = "An error occurred. Please try again or type 'reset'.";

/// Trees created without an explicit limit allow this many generations.
pub const DEFAULT_GENERATION_LIMIT: i64 = 4;

pub struct Engine {
    db: Arc<Database>,
    locks: LockManager,
    generation_limit: i64,
}

impl Engine {
    pub fn new(db: Arc<Database>, locks: LockManager, generation_limit: i64) -> Self {
        Self {
            db,
            locks,
            generation_limit,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn locks(&self) -> LockManager {
        self.locks
    }

    /// Run one turn for `sender`. Internal failures are logged and answered
    /// with a generic message; the stored state is then left as it was.
    pub fn handle_message(&self, sender: &str, body: &str) -> Reply {
        match self.process(sender, body) {
            Ok(reply) => reply,
            Err(e) => {
                error!(sender, "Dialog turn failed: {:#}", e);
                Reply::text(GENERIC_ERROR)
            }
        }
    }

    fn process(&self, sender: &str, body: &str) -> Result<Reply> {
        let user = self.db.get_or_create_user(sender)?;
        let current = DialogState::from_record(user.current_state.as_deref(), user.state_data.as_deref());
        let session = Session {
            db: &self.db,
            locks: self.locks,
            generation_limit: self.generation_limit,
            user_id: user.id,
        };

        let input = body.trim();
        let turn = if input.eq_ignore_ascii_case("reset") {
            session.reset(&current)?
        } else {
            session.step(current, input)?
        };

        let (tag, data) = turn.next.to_record()?;
        self.db.save_dialog_state(user.id, &tag, &data)?;
        debug!(user_id = user.id, state = %tag, "Dialog state saved");

        Ok(Reply::from(turn.reply))
    }
}

/// What a handler produced: the text to send and the state to store.
#[derive(Debug)]
pub(crate) struct Turn {
    reply: Vec<String>,
    next: DialogState,
}

impl Turn {
    /// Move to `next` with a prompt. Also used to re-prompt the same step.
    fn advance(next: DialogState, prompt: impl Into<String>) -> Self {
        Self {
            reply: vec![prompt.into()],
            next,
        }
    }

    /// End the flow: the message, then the main menu.
    fn finish(message: impl Into<String>) -> Self {
        Self {
            reply: vec![message.into(), MAIN_MENU_TEXT.to_string()],
            next: DialogState::MainMenu,
        }
    }

    fn menu() -> Self {
        Self::advance(DialogState::MainMenu, MAIN_MENU_TEXT)
    }
}

/// Borrowed view of the engine for the duration of one turn.
pub(crate) struct Session<'a> {
    db: &'a Database,
    locks: LockManager,
    generation_limit: i64,
    user_id: i64,
}

impl Session<'_> {
    fn step(&self, state: DialogState, input: &str) -> Result<Turn> {
        use DialogState::*;

        match state {
            MainMenu => self.main_menu(input),

            AddMemberName => self.add_member_name(input),
            AddMemberDob { name } => self.add_member_dob(name, input),
            AddMemberGender { name, dob } => self.add_member_gender(name, dob, input),
            AddMemberPhone { name, dob, gender } => self.add_member_phone(name, dob, gender, input),
            AddMemberRelation { draft } => self.add_member_relation(draft, input),
            AddMemberRelationType { draft, relative_id } => {
                self.add_member_relation_type(draft, relative_id, input)
            }

            EditSelectMember => self.edit_select_member(input),
            EditSelectField { member_id } => self.edit_select_field(member_id, input),
            EditEnterValue { member_id, field } => self.edit_enter_value(member_id, field, input),
            EditRelationTarget { member_id } => self.edit_relation_target(member_id, input),
            EditRelationType {
                member_id,
                target_id,
            } => self.edit_relation_type(member_id, target_id, input),

            ShareEnterPhone => self.share_enter_phone(input),
            TransferEnterPhone => self.transfer_enter_phone(input),
            DeleteConfirm => self.delete_confirm(input),

            EventSelectMember => self.event_select_member(input),
            EventAction { member_id } => self.event_action(member_id, input),
            EventType { member_id } => self.event_type(member_id, input),
            EventDate {
                member_id,
                event_type,
            } => self.event_date(member_id, event_type, input),
        }
    }

    /// Drop any in-progress context, releasing the edit lock it refers to.
    fn reset(&self, current: &DialogState) -> Result<Turn> {
        if let Some(member_id) = current.locked_member() {
            if self.locks.release(self.db, member_id, self.user_id)? {
                info!(member_id, user_id = self.user_id, "Edit lock released on reset");
            }
        }
        Ok(Turn::menu())
    }

    /// `member_id` if it exists and belongs to `tree_id`.
    fn member_in_tree(&self, tree_id: i64, member_id: i64) -> Result<Option<Member>> {
        Ok(self.db.get_member(member_id)?.filter(|m| m.tree_id == tree_id))
    }
}

/// `"{id}. {name} (Gen {g})"`, one per line.
fn member_list<'m>(members: impl IntoIterator<Item = &'m Member>) -> String {
    members
        .into_iter()
        .map(|m| format!("{}. {} (Gen {})", m.id, m.name, m.generation_level))
        .collect::<Vec<_>>()
        .join("\n")
}
