//! Stateless repositories. Every method takes a `&Connection`.

pub mod session;

pub use session::GameSessionRepo;
