//! Gmail access: the provider interface, its REST implementation, and credentials.

pub mod api;
pub mod auth;
pub mod client;

pub use api::{MailApi, MessagePage, MAX_PAGE_SIZE};
pub use client::GmailClient;
