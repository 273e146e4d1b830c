pub mod classes;
pub mod core;
pub mod history;
pub mod session;
pub mod students;
