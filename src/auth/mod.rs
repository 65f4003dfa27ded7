//! Account registration, login, and token handling.
//!
//! Provides:
//! - Account registration with username/email/password (PBKDF2-HMAC-SHA256,
//!   100k rounds + per-account salt)
//! - Signed bearer tokens (HMAC-SHA256 over JSON claims, time-limited)
//! - SQLite-backed persistent storage
//!
//! ## Design Decisions
//! - No external JWT dependency — tokens are a small signed-claims format
//!   built on the `hmac`/`sha2` crates already in the tree. Verification is
//!   stateless: no session table, nothing to revoke server-side.
//! - Login failures collapse to one error. Unknown email and wrong password
//!   are indistinguishable in both message and (approximate) timing.
//! - Password digests are self-describing (`pbkdf2-sha256$rounds$salt$hash`)
//!   so the round count can be raised without invalidating old accounts.

pub mod password;
pub mod store;
pub mod token;

pub use password::PasswordHasher;
pub use store::{Account, AccountStore};
pub use token::{load_or_generate_secret, TokenIssuer};
