//! Authentication for the plan API
//!
//! Bearer tokens signed with HS256. Identity only: any caller holding a
//! valid token may use every `/v1` route.

pub mod jwt;

pub use jwt::{extract_token_from_header, CallerIdentity, Claims, JwtValidator};
