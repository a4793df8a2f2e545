pub mod backends;
pub mod error;
pub mod maildrop;
pub mod r#trait;
pub mod types;

pub use backends::{FileMailStore, MemoryMailStore, Operation};
pub use error::{Result, StoreError};
pub use maildrop::Maildrop;
pub use r#trait::{Content, MailStore};
pub use types::{MailItem, MessageId};
