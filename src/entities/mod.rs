pub mod prelude;

pub mod ticket_comments;
pub mod tickets;
pub mod users;
