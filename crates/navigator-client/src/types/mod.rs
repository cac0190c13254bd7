pub mod chat;
pub mod events;
pub mod requests;
pub mod responses;
