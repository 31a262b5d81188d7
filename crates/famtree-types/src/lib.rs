pub mod api;
pub mod models;

pub use models::{Event, Gender, Member, RelationType, Relationship, Role, Tree, TreeAccess};
