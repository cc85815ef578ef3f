//! Types shared between the menu server and its clients.
pub mod domain;
pub mod error;
pub mod protocol;
