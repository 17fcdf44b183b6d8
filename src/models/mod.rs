pub mod comment;
pub mod ticket;
pub mod user;

pub use comment::TicketComment;
pub use ticket::{NewTicket, Ticket};
pub use user::{NewUser, ResetToken, User, UserPatch};
