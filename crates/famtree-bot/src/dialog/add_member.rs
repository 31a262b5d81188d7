use anyhow::Result;
use chrono::NaiveDate;
use famtree_db::models::NewMember;
use famtree_types::{Gender, Tree};
use tracing::{info, warn};

use super::{DialogState, MemberDraft, Session, Turn, member_list};
use crate::permissions::{Action, active_tree, authorize};
use crate::relations::{self, Kinship};
use crate::validators::{InputError, is_skip, normalize_phone, parse_id, validate_dob, validate_gender};

const ASK_DOB: &str = "Enter Date of Birth (DD-MM-YYYY):";
const ASK_GENDER: &str = "Enter Gender (Male/Female/Other):";
const ASK_PHONE: &str = "Enter Phone Number (optional, send 'skip' to skip):";
const RELATIVE_NOT_FOUND: &str = "Relative not found. Aborting.";

fn relation_type_prompt(relative_name: &str) -> String {
    format!(
        "What is the relationship of the NEW member to {}?\n{}",
        relative_name,
        Kinship::MENU
    )
}

impl Session<'_> {
    pub(super) fn add_member_name(&self, input: &str) -> Result<Turn> {
        if input.is_empty() {
            return Ok(Turn::advance(DialogState::AddMemberName, InputError::EmptyName.to_string()));
        }
        Ok(Turn::advance(
            DialogState::AddMemberDob {
                name: input.to_string(),
            },
            ASK_DOB,
        ))
    }

    pub(super) fn add_member_dob(&self, name: String, input: &str) -> Result<Turn> {
        match validate_dob(input) {
            Ok(dob) => Ok(Turn::advance(DialogState::AddMemberGender { name, dob }, ASK_GENDER)),
            Err(e) => Ok(Turn::advance(DialogState::AddMemberDob { name }, e.to_string())),
        }
    }

    pub(super) fn add_member_gender(&self, name: String, dob: NaiveDate, input: &str) -> Result<Turn> {
        match validate_gender(input) {
            Ok(gender) => Ok(Turn::advance(DialogState::AddMemberPhone { name, dob, gender }, ASK_PHONE)),
            Err(e) => Ok(Turn::advance(DialogState::AddMemberGender { name, dob }, e.to_string())),
        }
    }

    /// Last field. An empty tree takes the member as its root straight away;
    /// otherwise ask which relative to attach to.
    pub(super) fn add_member_phone(
        &self,
        name: String,
        dob: NaiveDate,
        gender: Gender,
        input: &str,
    ) -> Result<Turn> {
        let phone = if is_skip(input) {
            None
        } else {
            match normalize_phone(input) {
                Ok(phone) => Some(phone),
                Err(e) => {
                    return Ok(Turn::advance(DialogState::AddMemberPhone { name, dob, gender }, e.to_string()));
                }
            }
        };
        let draft = MemberDraft {
            name,
            dob,
            gender,
            phone,
        };

        let Some(active) = active_tree(self.db, self.user_id)? else {
            let tree = self.db.create_tree(self.user_id, self.generation_limit)?;
            info!(tree_id = tree.id, owner_id = self.user_id, "Tree created");
            return self.add_root_member(&tree, draft);
        };
        if let Err(denied) = authorize(active.role, Action::AddMember) {
            return Ok(Turn::finish(denied.message));
        }

        let members = self.db.list_members(active.tree.id)?;
        if members.is_empty() {
            return self.add_root_member(&active.tree, draft);
        }
        Ok(Turn::advance(
            DialogState::AddMemberRelation { draft },
            format!(
                "Who is this member related to? Enter the ID of the relative:\n{}",
                member_list(&members)
            ),
        ))
    }

    fn add_root_member(&self, tree: &Tree, draft: MemberDraft) -> Result<Turn> {
        let member = self.db.create_member(&NewMember {
            tree_id: tree.id,
            name: &draft.name,
            dob: draft.dob,
            gender: draft.gender,
            phone: draft.phone.as_deref(),
            generation_level: 1,
        })?;
        info!(tree_id = tree.id, member_id = member.id, "Root member added");
        Ok(Turn::finish(format!("✅ Added {} to the tree!", member.name)))
    }

    pub(super) fn add_member_relation(&self, draft: MemberDraft, input: &str) -> Result<Turn> {
        let relative_id = match parse_id(input) {
            Ok(id) => id,
            Err(e) => return Ok(Turn::advance(DialogState::AddMemberRelation { draft }, e.to_string())),
        };
        let Some(active) = active_tree(self.db, self.user_id)? else {
            return Ok(Turn::finish("Tree not found."));
        };
        let Some(relative) = self.member_in_tree(active.tree.id, relative_id)? else {
            return Ok(Turn::finish(RELATIVE_NOT_FOUND));
        };
        Ok(Turn::advance(
            DialogState::AddMemberRelationType { draft, relative_id },
            relation_type_prompt(&relative.name),
        ))
    }

    /// Final step: place, insert, link. Member and edges are separate
    /// writes, so a failed link leaves the member in place unlinked.
    pub(super) fn add_member_relation_type(
        &self,
        draft: MemberDraft,
        relative_id: i64,
        input: &str,
    ) -> Result<Turn> {
        let kinship = match Kinship::from_choice(input) {
            Ok(kinship) => kinship,
            Err(e) => {
                return Ok(Turn::advance(
                    DialogState::AddMemberRelationType { draft, relative_id },
                    e.to_string(),
                ));
            }
        };

        let Some(active) = active_tree(self.db, self.user_id)? else {
            return Ok(Turn::finish("Tree not found."));
        };
        if let Err(denied) = authorize(active.role, Action::AddMember) {
            return Ok(Turn::finish(denied.message));
        }
        let tree = active.tree;
        let Some(relative) = self.member_in_tree(tree.id, relative_id)? else {
            return Ok(Turn::finish(RELATIVE_NOT_FOUND));
        };

        let parents = self.db.get_parent_ids(tree.id, relative.id)?;
        let placement = relations::resolve(&relative, &parents, kinship);
        if !tree.allows_generation(placement.generation) {
            let prompt = format!(
                "That would put {} at generation {}, but this tree allows generations 1-{}. \
                 Choose a different relationship:\n{}",
                draft.name,
                placement.generation,
                tree.generation_limit,
                Kinship::MENU
            );
            return Ok(Turn::advance(DialogState::AddMemberRelationType { draft, relative_id }, prompt));
        }

        let member = self.db.create_member(&NewMember {
            tree_id: tree.id,
            name: &draft.name,
            dob: draft.dob,
            gender: placement.implied_gender.unwrap_or(draft.gender),
            phone: draft.phone.as_deref(),
            generation_level: placement.generation,
        })?;

        if let Err(e) = relations::link(self.db, tree.id, member.id, &placement) {
            warn!(member_id = member.id, relative_id, "Member created but linking failed: {:#}", e);
            return Ok(Turn::finish(format!("❌ Failed to add member: {}", e)));
        }

        info!(
            tree_id = tree.id,
            member_id = member.id,
            relative_id,
            ?kinship,
            generation = placement.generation,
            "Member added"
        );
        Ok(Turn::finish(format!("✅ Added {} to the tree!", member.name)))
    }
}
