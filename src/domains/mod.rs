pub mod chat;
pub mod entity;
