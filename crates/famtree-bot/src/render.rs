//! Text outline of a family tree.
//!
//! Roots are members without a recorded parent, ordered by generation and
//! then id. Partners (explicit spouses, or two parents of the same child)
//! share a line, and their children are merged and ordered by date of birth
//! with unknown dates last. Each member is printed exactly once.

use std::collections::{BTreeSet, HashMap, HashSet};

use famtree_types::{Member, RelationType, Relationship};

pub const EMPTY_TREE: &str = "Tree is empty.";

#[derive(Debug, Clone, Copy)]
enum Branch {
    Root,
    Middle,
    Last,
}

impl Branch {
    fn glyph(self) -> &'static str {
        match self {
            Self::Root => "",
            Self::Middle => "├── ",
            Self::Last => "└── ",
        }
    }

    /// Continuation drawn in front of this node's children.
    fn indent(self) -> &'static str {
        match self {
            Self::Root => "",
            Self::Middle => "│   ",
            Self::Last => "    ",
        }
    }
}

struct Frame {
    member_id: i64,
    prefix: String,
    branch: Branch,
}

/// Adjacency built once per render.
struct Graph<'a> {
    members: HashMap<i64, &'a Member>,
    children: HashMap<i64, BTreeSet<i64>>,
    partners: HashMap<i64, BTreeSet<i64>>,
    has_parent: HashSet<i64>,
}

impl<'a> Graph<'a> {
    fn build(members: &'a [Member], relationships: &[Relationship]) -> Self {
        let members: HashMap<i64, &Member> = members.iter().map(|m| (m.id, m)).collect();
        let mut children: HashMap<i64, BTreeSet<i64>> = HashMap::new();
        let mut parents: HashMap<i64, BTreeSet<i64>> = HashMap::new();
        let mut partners: HashMap<i64, BTreeSet<i64>> = HashMap::new();

        for r in relationships {
            if r.parent_id == r.child_id
                || !members.contains_key(&r.parent_id)
                || !members.contains_key(&r.child_id)
            {
                continue;
            }
            match r.relation_type {
                RelationType::Parent => {
                    children.entry(r.parent_id).or_default().insert(r.child_id);
                    parents.entry(r.child_id).or_default().insert(r.parent_id);
                }
                RelationType::Spouse => {
                    partners.entry(r.parent_id).or_default().insert(r.child_id);
                    partners.entry(r.child_id).or_default().insert(r.parent_id);
                }
                // Sibling-only members surface as their own roots.
                RelationType::Sibling => {}
            }
        }

        // Co-parents of a child are partners even without a spouse edge.
        for co_parents in parents.values().filter(|p| p.len() > 1) {
            for &a in co_parents {
                for &b in co_parents {
                    if a != b {
                        partners.entry(a).or_default().insert(b);
                    }
                }
            }
        }

        Self {
            members,
            children,
            has_parent: parents.into_keys().collect(),
            partners,
        }
    }

    fn roots(&self) -> Vec<&'a Member> {
        let mut roots: Vec<&Member> = self
            .members
            .values()
            .copied()
            .filter(|m| !self.has_parent.contains(&m.id))
            .collect();
        roots.sort_by_key(|m| (m.generation_level, m.id));
        roots
    }

    fn undrawn_partners(&self, member_id: i64, drawn: &HashSet<i64>) -> Vec<&'a Member> {
        self.partners
            .get(&member_id)
            .into_iter()
            .flatten()
            .filter(|id| **id != member_id && !drawn.contains(*id))
            .filter_map(|id| self.members.get(id).copied())
            .collect()
    }

    /// Union of the group's children, by date of birth, unknown dates last.
    fn group_children(&self, group: &[&Member]) -> Vec<i64> {
        let mut ids: Vec<i64> = group
            .iter()
            .filter_map(|m| self.children.get(&m.id))
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        ids.sort_by_key(|id| {
            let dob = self.members.get(id).and_then(|m| m.dob);
            (dob.is_none(), dob, *id)
        });
        ids
    }

    /// Depth-first emission from `root` using an explicit stack.
    fn draw(&self, root: i64, drawn: &mut HashSet<i64>, out: &mut Vec<String>) {
        let mut stack = vec![Frame {
            member_id: root,
            prefix: String::new(),
            branch: Branch::Root,
        }];

        while let Some(frame) = stack.pop() {
            if drawn.contains(&frame.member_id) {
                continue;
            }
            let Some(member) = self.members.get(&frame.member_id).copied() else {
                continue;
            };

            let mut group = vec![member];
            group.extend(self.undrawn_partners(member.id, drawn));
            drawn.extend(group.iter().map(|m| m.id));

            let names: Vec<String> = group.iter().map(|m| m.label()).collect();
            out.push(format!(
                "{}{}{}, Gen {}",
                frame.prefix,
                frame.branch.glyph(),
                names.join(" & "),
                member.generation_level
            ));

            let children = self.group_children(&group);
            let child_prefix = format!("{}{}", frame.prefix, frame.branch.indent());
            let last = children.len().saturating_sub(1);
            // Reverse push so the eldest child is drawn first.
            for (i, child) in children.into_iter().enumerate().rev() {
                stack.push(Frame {
                    member_id: child,
                    prefix: child_prefix.clone(),
                    branch: if i == last { Branch::Last } else { Branch::Middle },
                });
            }
        }
    }
}

pub fn render_tree(members: &[Member], relationships: &[Relationship]) -> String {
    if members.is_empty() {
        return EMPTY_TREE.to_string();
    }

    let graph = Graph::build(members, relationships);
    let mut out = vec![
        format!("🌳 *Your Family Tree* ({} members)", members.len()),
        String::new(),
    ];
    let mut drawn = HashSet::new();

    for root in graph.roots() {
        if drawn.contains(&root.id) {
            continue;
        }
        graph.draw(root.id, &mut drawn, &mut out);
        out.push(String::new());
    }

    // Members on a parent cycle have no root above them.
    let mut rest: Vec<&Member> = members.iter().filter(|m| !drawn.contains(&m.id)).collect();
    rest.sort_by_key(|m| (m.generation_level, m.id));
    for member in rest {
        if drawn.contains(&member.id) {
            continue;
        }
        graph.draw(member.id, &mut drawn, &mut out);
        out.push(String::new());
    }

    out.join("\n")
}
