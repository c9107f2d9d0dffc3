pub mod admin;
pub mod core;
pub mod mentor;
pub mod school_admin;
pub mod setup;
pub mod students;
