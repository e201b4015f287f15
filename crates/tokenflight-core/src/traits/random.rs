//! Random source trait.

use crate::error::RandomUnavailable;

/// Supplier of cryptographically strong random bytes.
pub trait RandomSource: Send + Sync {
    /// Fill `dest` entirely or fail.
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), RandomUnavailable>;
}

/// Generate `byte_count` random bytes rendered as lowercase hex
/// (`2 * byte_count` characters).
pub fn random_hex(
    source: &dyn RandomSource,
    byte_count: usize,
) -> Result<String, RandomUnavailable> {
    let mut bytes = vec![0u8; byte_count];
    source.fill_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}
