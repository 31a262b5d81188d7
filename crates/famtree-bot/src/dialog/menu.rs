use anyhow::Result;

use super::{DialogState, Session, Turn, member_list};
use crate::permissions::{Action, active_tree, authorize};
use crate::render::render_tree;

pub const MAIN_MENU_TEXT: &str = "🌳 *Family Tree Bot* 🌳\n\n\
    1. 👁 View Tree\n\
    2. ➕ Add Member\n\
    3. ✏️ Edit Member\n\
    4. 📤 Share Tree\n\
    5. 🔄 Transfer Ownership\n\
    6. 🗑 Delete Tree\n\
    7. ℹ️ Help\n\
    8. 📅 Manage Events";

pub const HELP_TEXT: &str = "ℹ️ *Help*\n\n\
    Reply with a number from the menu to pick an action.\n\
    Dates are written DD-MM-YYYY.\n\
    Send 'menu' to see the options again.\n\
    Send 'reset' anytime to return to the main menu.";

const INVALID_OPTION: &str = "Invalid option. Send 'menu' to see options.";
const NO_TREE_YET: &str = "You don't have a tree yet. Select 'Add Member' to start!";
const NO_TREE: &str = "No tree found.";
const NOT_OWNER_SHARE: &str = "You do not own a tree to share.";
const NOT_OWNER: &str = "You do not own a tree.";

impl Session<'_> {
    pub(super) fn main_menu(&self, input: &str) -> Result<Turn> {
        match input.to_lowercase().as_str() {
            "1" => self.view_tree(),
            "2" => self.start_add_member(),
            "3" => self.start_edit(),
            "4" => self.start_owner_flow(Action::Share),
            "5" => self.start_owner_flow(Action::Transfer),
            "6" => self.start_owner_flow(Action::Delete),
            "7" => Ok(Turn::advance(DialogState::MainMenu, HELP_TEXT)),
            "8" => self.start_events(),
            "hi" | "hello" | "menu" | "start" => Ok(Turn::menu()),
            _ => Ok(Turn::advance(DialogState::MainMenu, INVALID_OPTION)),
        }
    }

    fn view_tree(&self) -> Result<Turn> {
        let Some(active) = active_tree(self.db, self.user_id)? else {
            return Ok(Turn::advance(DialogState::MainMenu, NO_TREE_YET));
        };
        let members = self.db.list_members(active.tree.id)?;
        let relationships = self.db.list_relationships(active.tree.id)?;
        Ok(Turn::advance(DialogState::MainMenu, render_tree(&members, &relationships)))
    }

    fn start_add_member(&self) -> Result<Turn> {
        // Without any tree the first member creates one, so only an
        // existing tree is gated.
        if let Some(active) = active_tree(self.db, self.user_id)? {
            if let Err(denied) = authorize(active.role, Action::AddMember) {
                return Ok(Turn::finish(denied.message));
            }
        }
        Ok(Turn::advance(DialogState::AddMemberName, "Enter the name of the new member:"))
    }

    fn start_edit(&self) -> Result<Turn> {
        let Some(active) = active_tree(self.db, self.user_id)? else {
            return Ok(Turn::finish(NO_TREE));
        };
        if let Err(denied) = authorize(active.role, Action::EditMember) {
            return Ok(Turn::finish(denied.message));
        }
        let members = self.db.list_members(active.tree.id)?;
        if members.is_empty() {
            return Ok(Turn::finish("No members to edit."));
        }
        Ok(Turn::advance(
            DialogState::EditSelectMember,
            format!("Enter the ID of the member to edit:\n{}", member_list(&members)),
        ))
    }

    /// Share, transfer and delete all start the same way.
    fn start_owner_flow(&self, action: Action) -> Result<Turn> {
        let Some(active) = active_tree(self.db, self.user_id)? else {
            let message = if action == Action::Share { NOT_OWNER_SHARE } else { NOT_OWNER };
            return Ok(Turn::finish(message));
        };
        if let Err(denied) = authorize(active.role, action) {
            return Ok(Turn::finish(denied.message));
        }

        let (next, prompt) = match action {
            Action::Share => (
                DialogState::ShareEnterPhone,
                "Enter the phone number to share with (e.g. +1234567890).\n\
                 Add 'editor' after the number to let them edit; the default is viewer.",
            ),
            Action::Transfer => (
                DialogState::TransferEnterPhone,
                "Enter the phone number of the new owner:",
            ),
            _ => (
                DialogState::DeleteConfirm,
                "Are you sure you want to delete your tree? This cannot be undone. Reply 'yes' to confirm.",
            ),
        };
        Ok(Turn::advance(next, prompt))
    }

    fn start_events(&self) -> Result<Turn> {
        let Some(active) = active_tree(self.db, self.user_id)? else {
            return Ok(Turn::finish(NO_TREE));
        };
        let members = self.db.list_members(active.tree.id)?;
        if members.is_empty() {
            return Ok(Turn::finish("No members found. Add members first."));
        }
        Ok(Turn::advance(
            DialogState::EventSelectMember,
            format!("Select a member to manage events for:\n{}", member_list(&members)),
        ))
    }
}
