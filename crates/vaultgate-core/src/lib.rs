//! Core of an encrypting storage gateway: a chunked AEAD codec, a metadata
//! store, a pluggable remote blob store contract, the proxy that ties them
//! together, a pending-write cache for two-phase client creates, and a
//! password-protected share archive codec for handing a subtree to a
//! second vault with a different master key.

pub mod crypto;
pub mod error;
pub mod metadata;
pub mod path;
pub mod pending;
pub mod proxy;
pub mod remote;
pub mod share;

pub use error::GatewayError;
pub use path::VaultPath;
pub use proxy::Proxy;
