// store

mod revocation_store;

pub use revocation_store::*;

// repo

mod credential_repo;

pub use credential_repo::*;

// time

mod clock;

pub use clock::*;
