//! Conversational engine for a shared family tree, driven one text message
//! at a time. All conversation context lives server-side, keyed by the
//! sender's phone number.

pub mod dialog;
pub mod locks;
pub mod permissions;
pub mod relations;
pub mod render;
pub mod reply;
pub mod signature;
pub mod validators;
pub mod webhook;

pub use dialog::{DialogState, Engine};
pub use locks::LockManager;
pub use reply::Reply;
