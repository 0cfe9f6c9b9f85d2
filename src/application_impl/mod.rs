mod auth_service_fake;
mod auth_service_impl;
mod jwt_codec;
mod password_hasher;
mod revocation_guard;

pub use auth_service_fake::*;
pub use auth_service_impl::*;
pub use jwt_codec::*;
pub use password_hasher::*;
pub use revocation_guard::*;

#[cfg(test)]
pub(crate) mod testutil;
