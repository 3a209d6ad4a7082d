pub mod storage;
pub mod types;

pub use storage::ConversationStore;
pub use types::{Role, Turn};
