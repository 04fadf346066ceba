pub mod attachment;
pub mod issue;
pub mod report;
pub mod vote;

pub use attachment::*;
pub use issue::*;
pub use report::*;
pub use vote::*;
