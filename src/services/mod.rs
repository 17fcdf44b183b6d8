pub mod validation;

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService};
pub use auth_service_impl::SeaOrmAuthService;

pub mod ticket_service;
pub mod ticket_service_impl;
pub use ticket_service::{TicketError, TicketService};
pub use ticket_service_impl::SeaOrmTicketService;

pub mod comment_service;
pub mod comment_service_impl;
pub use comment_service::{CommentError, CommentService};
pub use comment_service_impl::SeaOrmCommentService;
