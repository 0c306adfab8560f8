pub mod analysis;
pub mod role;
pub mod user;
