// Encryption and encrypted storage

pub mod crypto;
pub mod secure_storage;

pub use crypto::CryptoService;
pub use secure_storage::SecureStorage;
