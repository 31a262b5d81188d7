//! Row and write-side types that only the store needs. Read-side domain
//! types live in `famtree-types`.

use chrono::NaiveDate;
use famtree_types::Gender;

pub struct UserRow {
    pub id: i64,
    pub phone: String,
    pub name: Option<String>,
    /// Dialog state tag, `None` for a user that never left the menu.
    pub current_state: Option<String>,
    /// JSON object holding the context for `current_state`.
    pub state_data: Option<String>,
    pub created_at: String,
}

pub struct NewMember<'a> {
    pub tree_id: i64,
    pub name: &'a str,
    pub dob: NaiveDate,
    pub gender: Gender,
    pub phone: Option<&'a str>,
    pub generation_level: i64,
}

/// One field assignment on an existing member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberUpdate {
    Name(String),
    Dob(NaiveDate),
    Gender(Gender),
    Phone(Option<String>),
    GenerationLevel(i64),
}
