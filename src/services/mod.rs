pub mod issue_service;
pub mod report_service;
pub mod summary_service;
