//! Validator address derivation from public keys.
//!
//! Address format: `amed_` + base32(public_key, 52 chars) + base32(checksum, 8 chars).
//! The checksum is the first 5 bytes of Blake2b-256(public_key). The alphabet
//! `13456789abcdefghijkmnopqrstuwxyz` leaves out visually ambiguous characters,
//! which matters for addresses that operators copy into config files by hand.

use authentimed_types::{PublicKey, ValidatorAddress};

const BASE32_ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

/// ASCII byte -> 5-bit value, 0xFF for bytes outside the alphabet.
const BASE32_DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let mut i = 0;
    while i < 32 {
        table[BASE32_ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

const PUBKEY_CHARS: usize = 52;
const CHECKSUM_CHARS: usize = 8;
const ENCODED_LEN: usize = PUBKEY_CHARS + CHECKSUM_CHARS;
const CHECKSUM_BYTES: usize = 5;

fn encode_base32(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u64 = 0;
    let mut bits = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | byte as u64;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1F) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1F) as usize] as char);
    }
    out
}

fn decode_base32_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    let mut buffer: u64 = 0;
    let mut bits = 0;
    let mut out = [0u8; N];
    let mut pos = 0;

    for c in s.bytes() {
        let val = *BASE32_DECODE.get(c as usize)?;
        if val == 0xFF {
            return None;
        }
        buffer = (buffer << 5) | val as u64;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            if pos < N {
                out[pos] = (buffer >> bits) as u8;
                pos += 1;
            }
        }
    }
    (pos == N).then_some(out)
}

fn checksum(public_key: &[u8; 32]) -> [u8; CHECKSUM_BYTES] {
    let hash = crate::blake2b_256(public_key);
    let mut out = [0u8; CHECKSUM_BYTES];
    out.copy_from_slice(&hash[..CHECKSUM_BYTES]);
    out
}

/// Derive the `amed_`-prefixed address of a validator public key.
pub fn derive_address(public_key: &PublicKey) -> ValidatorAddress {
    ValidatorAddress::from_encoded(format!(
        "{}{}{}",
        ValidatorAddress::PREFIX,
        encode_base32(public_key.as_bytes()),
        encode_base32(&checksum(public_key.as_bytes())),
    ))
}

/// Extract the public key bytes from an address string.
///
/// Returns `None` if the address is malformed or its checksum does not match.
pub fn decode_address(address: &str) -> Option<[u8; 32]> {
    let encoded = address.strip_prefix(ValidatorAddress::PREFIX)?;
    if encoded.len() != ENCODED_LEN {
        return None;
    }
    let (key_part, sum_part) = encoded.split_at(PUBKEY_CHARS);
    let key: [u8; 32] = decode_base32_fixed(key_part)?;
    let sum: [u8; CHECKSUM_BYTES] = decode_base32_fixed(sum_part)?;
    (sum == checksum(&key)).then_some(key)
}

/// The public key behind a validator address.
pub fn public_key_of(address: &ValidatorAddress) -> Option<PublicKey> {
    decode_address(address.as_str()).map(PublicKey)
}

/// Whether an address string is well-formed and its checksum is correct.
pub fn validate_address(address: &str) -> bool {
    decode_address(address).is_some()
}
