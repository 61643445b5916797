//! Token lifecycle and session state for password and Google logins.
//!
//! Access tokens are short-lived HS256 JWTs, refresh tokens are opaque random
//! strings kept in a session store next to a revocation list. The
//! [`manager::SessionManager`] ties these together into the register, login,
//! logout, refresh and federated login flows exposed by [`api`].

pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod federation;
pub mod guard;
pub mod manager;
pub mod password;
pub mod response;
pub mod session;
pub mod token;
pub mod users;
