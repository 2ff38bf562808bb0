//! Frame id ranges.
//!
//! Ids 0-63 carry application data. Ids 64-255 are reserved for
//! transport-internal frames; decoders drop them without surfacing them.

/// Highest id an application frame may use.
pub const MAX_ID: u8 = 63;

/// First reserved id.
pub const RESERVED_ID_START: u8 = 64;

/// Returns true if a decoded id belongs to the reserved range.
pub fn is_reserved(id: u8) -> bool {
    id >= RESERVED_ID_START
}

/// Returns true if `id` may be encoded.
pub fn is_valid(id: u32) -> bool {
    id <= u32::from(MAX_ID)
}
