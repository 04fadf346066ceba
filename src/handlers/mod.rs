pub mod feed;
pub mod issues;
pub mod reports;
