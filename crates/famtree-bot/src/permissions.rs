use anyhow::Result;
use famtree_db::Database;
use famtree_types::{Role, Tree};

/// The tree a user is working on, with the role they hold there.
#[derive(Debug, Clone)]
pub struct ActiveTree {
    pub tree: Tree,
    pub role: Option<Role>,
}

/// Operations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AddMember,
    EditMember,
    AddEvent,
    Share,
    Transfer,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PermissionDenied {
    pub action: Action,
    pub message: &'static str,
}

/// The owner field on the tree wins over any grant row.
pub fn role_for(db: &Database, user_id: i64, tree: &Tree) -> Result<Option<Role>> {
    if tree.owner_id == user_id {
        return Ok(Some(Role::Owner));
    }
    db.get_access_role(tree.id, user_id)
}

/// The tree the user owns, else the earliest tree shared with them.
pub fn active_tree(db: &Database, user_id: i64) -> Result<Option<ActiveTree>> {
    let tree = match db.get_tree_by_owner(user_id)? {
        Some(tree) => Some(tree),
        None => db.first_shared_tree(user_id)?,
    };
    let Some(tree) = tree else {
        return Ok(None);
    };
    let role = role_for(db, user_id, &tree)?;
    Ok(Some(ActiveTree { tree, role }))
}

pub fn authorize(role: Option<Role>, action: Action) -> Result<(), PermissionDenied> {
    let allowed = match action {
        Action::AddMember | Action::EditMember | Action::AddEvent => {
            role.is_some_and(Role::can_edit)
        }
        Action::Share | Action::Transfer | Action::Delete => role == Some(Role::Owner),
    };
    if allowed {
        return Ok(());
    }

    let message = match (action, role) {
        (Action::AddMember, Some(Role::Viewer)) => "🔒 You are a Viewer. You cannot add members.",
        (Action::EditMember, Some(Role::Viewer)) => "🔒 You are a Viewer. You cannot edit members.",
        (Action::AddEvent, _) => "🔒 Only Owners and Editors can add events.",
        (Action::Share, _) => "🔒 Only the Owner can share the tree.",
        (Action::Transfer, _) => "🔒 Only the Owner can transfer ownership.",
        (Action::Delete, _) => "🔒 Only the Owner can delete the tree.",
        _ => "Permission denied.",
    };
    Err(PermissionDenied { action, message })
}
