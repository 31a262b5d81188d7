//! Owner-only flows: share, transfer, delete.

use anyhow::Result;
use famtree_types::Role;
use tracing::info;

use super::{DialogState, Session, Turn};
use crate::permissions::{Action, ActiveTree, active_tree, authorize};
use crate::validators::{InputError, normalize_phone};

/// Parsed share request: phone plus an optional trailing role word.
#[derive(Debug, PartialEq, Eq)]
enum ShareTarget {
    Grant { phone: String, role: Role },
    OwnerRequested,
}

fn parse_share_target(input: &str) -> Result<ShareTarget, InputError> {
    let mut words: Vec<&str> = input.split_whitespace().collect();
    let role = match words.last().map(|w| w.to_lowercase()) {
        Some(word) if word == "viewer" || word == "editor" || word == "owner" => {
            words.pop();
            Role::from_db(&word)
        }
        _ => None,
    };
    if role == Some(Role::Owner) {
        return Ok(ShareTarget::OwnerRequested);
    }
    let phone = normalize_phone(&words.join(" "))?;
    Ok(ShareTarget::Grant {
        phone,
        role: role.unwrap_or(Role::Viewer),
    })
}

impl Session<'_> {
    fn owned_tree(&self, action: Action) -> Result<Result<ActiveTree, Turn>> {
        let Some(active) = active_tree(self.db, self.user_id)? else {
            return Ok(Err(Turn::finish("You do not own a tree.")));
        };
        if let Err(denied) = authorize(active.role, action) {
            return Ok(Err(Turn::finish(denied.message)));
        }
        Ok(Ok(active))
    }

    pub(super) fn share_enter_phone(&self, input: &str) -> Result<Turn> {
        let (phone, role) = match parse_share_target(input) {
            Ok(ShareTarget::Grant { phone, role }) => (phone, role),
            Ok(ShareTarget::OwnerRequested) => {
                return Ok(Turn::advance(
                    DialogState::ShareEnterPhone,
                    "A tree has only one owner. Use 'Transfer Ownership' for that, \
                     or share as viewer or editor:",
                ));
            }
            Err(e) => return Ok(Turn::advance(DialogState::ShareEnterPhone, e.to_string())),
        };

        let active = match self.owned_tree(Action::Share)? {
            Ok(active) => active,
            Err(turn) => return Ok(turn),
        };
        let target = self.db.get_or_create_user(&phone)?;
        if target.id == self.user_id {
            return Ok(Turn::finish("You cannot share the tree with yourself."));
        }

        self.db.grant_access(active.tree.id, target.id, role)?;
        info!(tree_id = active.tree.id, grantee = target.id, role = role.as_str(), "Access granted");
        Ok(Turn::finish(format!("✅ Access granted to {} as {}.", phone, role.label())))
    }

    pub(super) fn transfer_enter_phone(&self, input: &str) -> Result<Turn> {
        let phone = match normalize_phone(input) {
            Ok(phone) => phone,
            Err(e) => return Ok(Turn::advance(DialogState::TransferEnterPhone, e.to_string())),
        };

        let active = match self.owned_tree(Action::Transfer)? {
            Ok(active) => active,
            Err(turn) => return Ok(turn),
        };
        let target = self.db.get_or_create_user(&phone)?;
        if target.id == self.user_id {
            return Ok(Turn::finish("You already own this tree."));
        }
        if self.db.get_tree_by_owner(target.id)?.is_some() {
            return Ok(Turn::finish(format!(
                "{} already owns a family tree and cannot take over another.",
                phone
            )));
        }

        self.db.transfer_ownership(active.tree.id, target.id)?;
        info!(tree_id = active.tree.id, from = self.user_id, to = target.id, "Ownership transferred");
        Ok(Turn::finish(format!(
            "✅ Ownership transferred to {}. You are now an Editor.",
            phone
        )))
    }

    pub(super) fn delete_confirm(&self, input: &str) -> Result<Turn> {
        if !input.eq_ignore_ascii_case("yes") {
            return Ok(Turn::finish("Deletion cancelled."));
        }
        let active = match self.owned_tree(Action::Delete)? {
            Ok(active) => active,
            Err(turn) => return Ok(turn),
        };
        if self.db.delete_tree(active.tree.id)? {
            info!(tree_id = active.tree.id, owner_id = self.user_id, "Tree deleted");
            Ok(Turn::finish("✅ Tree deleted successfully."))
        } else {
            Ok(Turn::finish("Tree not found."))
        }
    }
}
