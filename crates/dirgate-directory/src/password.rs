//! Password attribute encoding.

/// Encodes a plaintext password for the `unicodePwd` attribute.
///
/// The directory only accepts the password wrapped in double quotes and encoded as UTF-16
/// little-endian. No length or character checks happen here; the server enforces its own
/// policy and reports violations on the modify.
#[must_use]
pub fn encode_password(plaintext: &str) -> Vec<u8> {
    format!("\"{plaintext}\"")
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}
