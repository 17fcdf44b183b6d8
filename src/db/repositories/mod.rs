pub mod comment;
pub mod ticket;
pub mod user;
