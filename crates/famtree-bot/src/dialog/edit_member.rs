use anyhow::Result;
use famtree_db::models::MemberUpdate;
use famtree_types::{Member, Tree};
use tracing::{info, warn};

use super::{DialogState, EditField, Session, Turn, member_list};
use crate::permissions::{Action, active_tree, authorize};
use crate::relations::{self, Kinship};
use crate::validators::{
    InputError, is_skip, normalize_phone, parse_id, validate_dob, validate_gender,
};

const FIELD_MENU: &str = "1. Name\n2. DOB\n3. Gender\n4. Phone\n5. Relation";
const MEMBER_NOT_FOUND: &str = "Member not found in your tree.";
const LOCK_LOST: &str = "⚠️ You no longer hold the edit lock on this member. Please start again.";

/// Outcome of re-checking that an edit may still be written.
enum Gate {
    Open(Tree, Member),
    Closed(Turn),
}

impl Session<'_> {
    /// Choosing the member takes its edit lock.
    pub(super) fn edit_select_member(&self, input: &str) -> Result<Turn> {
        let member_id = match parse_id(input) {
            Ok(id) => id,
            Err(e) => return Ok(Turn::advance(DialogState::EditSelectMember, e.to_string())),
        };
        let Some(active) = active_tree(self.db, self.user_id)? else {
            return Ok(Turn::finish("Tree not found."));
        };
        if let Err(denied) = authorize(active.role, Action::EditMember) {
            return Ok(Turn::finish(denied.message));
        }
        let Some(member) = self.member_in_tree(active.tree.id, member_id)? else {
            return Ok(Turn::finish(MEMBER_NOT_FOUND));
        };

        if !self.locks.acquire(self.db, member.id, self.user_id)? {
            info!(member_id, user_id = self.user_id, "Edit refused, member locked by another user");
            return Ok(Turn::finish(format!(
                "⚠️ {} is currently being edited by another user. Try again later.",
                member.name
            )));
        }

        Ok(Turn::advance(
            DialogState::EditSelectField { member_id },
            format!("Editing {}. What do you want to change?\n{}", member.name, FIELD_MENU),
        ))
    }

    pub(super) fn edit_select_field(&self, member_id: i64, input: &str) -> Result<Turn> {
        if let Some(field) = EditField::from_choice(input) {
            return Ok(Turn::advance(DialogState::EditEnterValue { member_id, field }, field.prompt()));
        }
        if input != "5" {
            return Ok(Turn::advance(
                DialogState::EditSelectField { member_id },
                InputError::InvalidChoice("1-5").to_string(),
            ));
        }

        let Some(member) = self.db.get_member(member_id)? else {
            return Ok(Turn::finish(MEMBER_NOT_FOUND));
        };
        let members = self.db.list_members(member.tree_id)?;
        let others = members.iter().filter(|m| m.id != member_id);
        Ok(Turn::advance(
            DialogState::EditRelationTarget { member_id },
            format!("Select the relative to link {} to:\n{}", member.name, member_list(others)),
        ))
    }

    pub(super) fn edit_enter_value(&self, member_id: i64, field: EditField, input: &str) -> Result<Turn> {
        let update = match parse_field(field, input) {
            Ok(update) => update,
            Err(e) => return Ok(Turn::advance(DialogState::EditEnterValue { member_id, field }, e.to_string())),
        };

        let member = match self.edit_gate(member_id)? {
            Gate::Open(_, member) => member,
            Gate::Closed(turn) => return Ok(turn),
        };

        self.db.update_member(member.id, &[update])?;
        self.locks.release(self.db, member.id, self.user_id)?;
        info!(member_id, user_id = self.user_id, ?field, "Member updated");
        Ok(Turn::finish("✅ Member updated successfully!"))
    }

    pub(super) fn edit_relation_target(&self, member_id: i64, input: &str) -> Result<Turn> {
        let target_id = match parse_id(input) {
            Ok(id) => id,
            Err(e) => return Ok(Turn::advance(DialogState::EditRelationTarget { member_id }, e.to_string())),
        };
        if target_id == member_id {
            return Ok(Turn::advance(
                DialogState::EditRelationTarget { member_id },
                "A member cannot be related to themselves. Enter another ID:",
            ));
        }

        let Some(member) = self.db.get_member(member_id)? else {
            return Ok(Turn::finish(MEMBER_NOT_FOUND));
        };
        let Some(target) = self.member_in_tree(member.tree_id, target_id)? else {
            self.locks.release(self.db, member_id, self.user_id)?;
            return Ok(Turn::finish("Relative not found."));
        };

        Ok(Turn::advance(
            DialogState::EditRelationType { member_id, target_id },
            format!(
                "What is {} to {}?\n{}",
                member.name,
                target.name,
                Kinship::MENU
            ),
        ))
    }

    /// Adds the new link and moves the member to the generation it implies.
    /// Existing edges are kept.
    pub(super) fn edit_relation_type(&self, member_id: i64, target_id: i64, input: &str) -> Result<Turn> {
        let kinship = match Kinship::from_choice(input) {
            Ok(kinship) => kinship,
            Err(e) => {
                return Ok(Turn::advance(
                    DialogState::EditRelationType { member_id, target_id },
                    e.to_string(),
                ));
            }
        };

        let (tree, member) = match self.edit_gate(member_id)? {
            Gate::Open(tree, member) => (tree, member),
            Gate::Closed(turn) => return Ok(turn),
        };
        let Some(target) = self.member_in_tree(tree.id, target_id)? else {
            self.locks.release(self.db, member_id, self.user_id)?;
            return Ok(Turn::finish("Relative not found."));
        };

        let parents = self.db.get_parent_ids(tree.id, target.id)?;
        let placement = relations::resolve(&target, &parents, kinship);
        if !tree.allows_generation(placement.generation) {
            return Ok(Turn::advance(
                DialogState::EditRelationType { member_id, target_id },
                format!(
                    "That would move {} to generation {}, but this tree allows generations 1-{}. \
                     Choose a different relationship:\n{}",
                    member.name,
                    placement.generation,
                    tree.generation_limit,
                    Kinship::MENU
                ),
            ));
        }

        if relations::creates_cycle(self.db, tree.id, member.id, &placement)? {
            info!(member_id, target_id, ?kinship, "Relink refused, would create an ancestry loop");
            return Ok(Turn::advance(
                DialogState::EditRelationType { member_id, target_id },
                format!(
                    "That would make {} their own ancestor. Choose a different relationship:\n{}",
                    member.name,
                    Kinship::MENU
                ),
            ));
        }

        if let Err(e) = relations::link(self.db, tree.id, member.id, &placement) {
            warn!(member_id, target_id, "Relinking failed: {:#}", e);
            self.locks.release(self.db, member_id, self.user_id)?;
            return Ok(Turn::finish(format!("❌ Failed to update relationship: {}", e)));
        }

        let mut updates = vec![MemberUpdate::GenerationLevel(placement.generation)];
        if let Some(gender) = placement.implied_gender {
            updates.push(MemberUpdate::Gender(gender));
        }
        self.db.update_member(member.id, &updates)?;
        self.locks.release(self.db, member_id, self.user_id)?;

        info!(member_id, target_id, ?kinship, generation = placement.generation, "Relationship updated");
        Ok(Turn::finish("✅ Relationship updated successfully!"))
    }

    /// The user must still be allowed to edit, the member must still be in
    /// their tree, and their lock must not have lapsed.
    fn edit_gate(&self, member_id: i64) -> Result<Gate> {
        let Some(active) = active_tree(self.db, self.user_id)? else {
            return Ok(Gate::Closed(Turn::finish("Tree not found.")));
        };
        if let Err(denied) = authorize(active.role, Action::EditMember) {
            self.locks.release(self.db, member_id, self.user_id)?;
            return Ok(Gate::Closed(Turn::finish(denied.message)));
        }
        let Some(member) = self.member_in_tree(active.tree.id, member_id)? else {
            return Ok(Gate::Closed(Turn::finish(MEMBER_NOT_FOUND)));
        };
        if !self.locks.holds(self.db, member_id, self.user_id)? {
            warn!(member_id, user_id = self.user_id, "Edit lock lost before write");
            return Ok(Gate::Closed(Turn::finish(LOCK_LOST)));
        }
        Ok(Gate::Open(active.tree, member))
    }
}

fn parse_field(field: EditField, input: &str) -> Result<MemberUpdate, InputError> {
    match field {
        EditField::Name if input.is_empty() => Err(InputError::EmptyName),
        EditField::Name => Ok(MemberUpdate::Name(input.to_string())),
        EditField::Dob => validate_dob(input).map(MemberUpdate::Dob),
        EditField::Gender => validate_gender(input).map(MemberUpdate::Gender),
        EditField::Phone if is_skip(input) => Ok(MemberUpdate::Phone(None)),
        EditField::Phone => normalize_phone(input).map(|p| MemberUpdate::Phone(Some(p))),
    }
}
