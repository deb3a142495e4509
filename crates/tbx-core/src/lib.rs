pub mod directory;
pub mod error;
pub mod events;
pub mod permissions;
pub mod sessions;
pub mod store;
pub mod testbox;
pub mod validation;

pub mod types;

pub use crate::error::TestboxError;
pub use crate::store::Store;
pub use crate::testbox::{ActorContext, Testbox};
