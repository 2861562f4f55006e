use nanoid::alphabet::SAFE;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

pub const ID_LENGTH: usize = 10;

#[derive(Error, Debug)]
#[error("failed to allocate paste id: {0}")]
pub struct AllocationError(#[from] rand::Error);

/// Draws a short URL-safe id straight from the OS RNG.
///
/// `SAFE` holds 64 symbols, so masking each byte to 6 bits is unbiased.
/// Collisions are left to the store's unique key.
pub fn allocate_id() -> Result<String, AllocationError> {
    let mut bytes = [0u8; ID_LENGTH];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(bytes
        .iter()
        .map(|byte| SAFE[usize::from(byte & 0x3f)])
        .collect())
}
