//! Encryption format version management
//!
//! Each format version byte maps to a fixed set of key derivation parameters
//! (implicit contract, the parameters are never written to the file).
//!
//! - Version 1: Argon2id, 3 iterations, 64 MiB memory, 4 lanes

/// Key derivation parameters bound to a format version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Argon2 time cost
    pub iterations: u32,
    /// Argon2 memory cost in KiB
    pub memory_kib: u32,
    /// Argon2 lanes
    pub parallelism: u32,
}

const VERSION_1_PARAMS: KdfParams = KdfParams {
    iterations: 3,
    memory_kib: 64 * 1024,
    parallelism: 4,
};

/// Current encryption format version byte
pub const CURRENT_FORMAT_VERSION: u8 = 1;

/// Get the key derivation parameters for the specified format version
///
/// # Returns
/// - `Some(params)` - parameters of this version
/// - `None` - unsupported version byte
pub const fn kdf_params(version: u8) -> Option<KdfParams> {
    match version {
        1 => Some(VERSION_1_PARAMS),
        _ => None,
    }
}

/// Parameters of the current format version (evaluated at compile time)
///
/// # Panics
/// Fails the build if `CURRENT_FORMAT_VERSION` has no parameters.
#[allow(clippy::panic)]
pub const fn current_kdf_params() -> KdfParams {
    match kdf_params(CURRENT_FORMAT_VERSION) {
        Some(params) => params,
        None => panic!("Invalid CURRENT_FORMAT_VERSION"),
    }
}
