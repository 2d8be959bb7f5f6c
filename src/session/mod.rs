//! Cookie-backed session handling
//!
//! The agent keeps no server-side session store. Everything it needs between
//! requests lives in encrypted cookies written and read through
//! [`CookieFactory`].

pub mod cookie;

pub use cookie::{
    create_expired_cookie, CookieFactory, CookieOptions, CookieType, TEMP_LOGIN_COOKIE_MINUTES,
};
