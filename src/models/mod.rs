pub mod decision;
pub mod role;
pub mod user;
