//! Password authentication
//!
//! Handles:
//! - Form login and logout
//! - Signed cookie sessions
//! - Authentication middleware

mod login;
mod middleware;
pub mod password;
pub mod session;

pub use login::auth_router;
pub use middleware::{CurrentUser, login_redirect, require_auth};
pub use password::{hash_password, verify_password};
pub use session::{SESSION_COOKIE, Session, create_session_token, verify_session_token};
