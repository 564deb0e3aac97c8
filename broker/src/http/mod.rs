//! HTTP interface of the broker: index, login and callback handlers plus the server setup.

pub mod index;
pub mod login;
pub mod server;

pub(crate) use server::*;
