//! Cookies: [`Cookie`], `Set-Cookie` parsing and the in-memory [`CookieJar`].

mod cookie;
mod cookie_jar;

pub use cookie::Cookie;
pub use cookie_jar::CookieJar;
pub use cookie_jar::CookieJarHandle;
