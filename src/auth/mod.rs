//! Authentication: password hashing, bearer tokens and the route guard.

mod gate;
pub mod password;
mod token;

pub use gate::{authorize, bearer_token, with_auth};
pub use token::{Claims, TokenError, TokenService, TOKEN_LIFETIME_DAYS};
