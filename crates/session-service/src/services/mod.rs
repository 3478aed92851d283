pub mod identity;
pub mod token_service;

pub use identity::{IdentityVerifier, InMemoryUserDirectory, NewUser, UserProfile};
pub use token_service::{TokenPair, TokenService};
