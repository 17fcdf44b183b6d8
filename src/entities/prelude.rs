pub use super::ticket_comments::Entity as TicketComments;
pub use super::tickets::Entity as Tickets;
pub use super::users::Entity as Users;
