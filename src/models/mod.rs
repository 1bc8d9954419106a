pub mod attendance;
pub mod emotion;
pub mod employee;
pub mod face;
pub mod user;
