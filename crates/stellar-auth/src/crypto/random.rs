// One-time token generation.
//
// Password-setup tokens are 32 random bytes, hex-encoded (64 chars).

use rand::RngCore;

/// Number of random bytes in a setup token.
const TOKEN_BYTES: usize = 32;

/// Generate a hex-encoded one-time token.
pub fn generate_setup_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
