//! Placement of a member relative to an existing one: which generation it
//! lands on, which edges connect it, and what gender the kinship implies.

use std::collections::HashSet;

use anyhow::Result;
use famtree_db::Database;
use famtree_types::{Gender, Member, RelationType};

use crate::validators::InputError;

/// Relationship of the subject *to* the chosen relative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kinship {
    Mother,
    Father,
    Child,
    Spouse,
    Brother,
    Sister,
}

impl Kinship {
    pub const MENU: &'static str = "1. Mother\n2. Father\n3. Child\n4. Spouse\n5. Brother\n6. Sister";

    pub fn from_choice(input: &str) -> Result<Self, InputError> {
        match input.trim() {
            "1" => Ok(Self::Mother),
            "2" => Ok(Self::Father),
            "3" => Ok(Self::Child),
            "4" => Ok(Self::Spouse),
            "5" => Ok(Self::Brother),
            "6" => Ok(Self::Sister),
            _ => Err(InputError::InvalidChoice("1-6")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// The member being placed; its id may not exist yet.
    Subject,
    Member(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEdge {
    pub parent: Endpoint,
    pub child: Endpoint,
    pub relation: RelationType,
}

impl PendingEdge {
    /// `(parent_id, child_id, relation)` once the subject has an id.
    pub fn bind(&self, subject_id: i64) -> (i64, i64, RelationType) {
        let resolve = |end: Endpoint| match end {
            Endpoint::Subject => subject_id,
            Endpoint::Member(id) => id,
        };
        (resolve(self.parent), resolve(self.child), self.relation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub generation: i64,
    pub edges: Vec<PendingEdge>,
    pub implied_gender: Option<Gender>,
}

/// Work out where a subject related to `relative` by `kinship` belongs.
///
/// `relative_parents` are the relative's recorded parent ids. A new sibling
/// shares all of them; with none recorded, a plain sibling edge is used.
pub fn resolve(relative: &Member, relative_parents: &[i64], kinship: Kinship) -> Placement {
    use Endpoint::{Member as M, Subject};

    let rel = relative.id;
    let level = relative.generation_level;
    let edge = |parent, child, relation| PendingEdge { parent, child, relation };

    match kinship {
        Kinship::Mother | Kinship::Father => Placement {
            generation: level - 1,
            edges: vec![edge(Subject, M(rel), RelationType::Parent)],
            implied_gender: Some(if kinship == Kinship::Mother {
                Gender::Female
            } else {
                Gender::Male
            }),
        },
        Kinship::Child => Placement {
            generation: level + 1,
            edges: vec![edge(M(rel), Subject, RelationType::Parent)],
            implied_gender: None,
        },
        Kinship::Spouse => Placement {
            generation: level,
            edges: vec![edge(M(rel), Subject, RelationType::Spouse)],
            implied_gender: None,
        },
        Kinship::Brother | Kinship::Sister => {
            let edges = if relative_parents.is_empty() {
                vec![edge(M(rel), Subject, RelationType::Sibling)]
            } else {
                relative_parents
                    .iter()
                    .map(|&p| edge(M(p), Subject, RelationType::Parent))
                    .collect()
            };
            Placement {
                generation: level,
                edges,
                implied_gender: Some(if kinship == Kinship::Brother {
                    Gender::Male
                } else {
                    Gender::Female
                }),
            }
        }
    }
}

/// Whether linking `subject_id` by `placement` would make some member its
/// own ancestor.
pub fn creates_cycle(db: &Database, tree_id: i64, subject_id: i64, placement: &Placement) -> Result<bool> {
    for edge in &placement.edges {
        let (parent_id, child_id, relation) = edge.bind(subject_id);
        if relation != RelationType::Parent || parent_id == child_id {
            continue;
        }
        if is_ancestor(db, tree_id, child_id, parent_id)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Walks parent edges upward from `descendant` looking for `ancestor`.
fn is_ancestor(db: &Database, tree_id: i64, ancestor: i64, descendant: i64) -> Result<bool> {
    let mut seen = HashSet::new();
    let mut frontier = vec![descendant];
    while let Some(id) = frontier.pop() {
        if id == ancestor {
            return Ok(true);
        }
        if seen.insert(id) {
            frontier.extend(db.get_parent_ids(tree_id, id)?);
        }
    }
    Ok(false)
}

/// Insert the placement's edges for `subject_id`. Self-loops are skipped.
/// Stops at the first failing insert; earlier edges stay.
pub fn link(db: &Database, tree_id: i64, subject_id: i64, placement: &Placement) -> Result<()> {
    for edge in &placement.edges {
        let (parent_id, child_id, relation) = edge.bind(subject_id);
        if parent_id == child_id {
            continue;
        }
        db.add_relationship(tree_id, parent_id, child_id, relation)?;
    }
    Ok(())
}
