//! OIDC client-credentials authentication.
//!
//! Network access and wall-clock time both sit behind traits ([`HttpTransport`], [`Clock`])
//! so the token lifecycle can be driven deterministically.

mod clock;
mod oidc;
mod transport;

pub use clock::{Clock, SystemClock};
pub use oidc::{Acquired, OidcAuthenticator};
pub use transport::HttpTransport;
