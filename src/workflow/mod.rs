pub mod issue;
pub mod types;

pub use issue::{resolve_issue, run};
