pub mod prelude;

pub mod analyses;
pub mod roles;
pub mod users;
