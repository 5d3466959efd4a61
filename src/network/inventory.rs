//! Inventory type identifiers
//!
//! Type codes carried in `inv` and `getdata` inventory vectors. The witness
//! flag selects the segregated-witness serialization of the same object.

/// Transaction inventory type
pub const MSG_TX: u32 = 1;

/// Block inventory type
pub const MSG_BLOCK: u32 = 2;

/// Witness flag, OR-ed onto a base inventory type
pub const MSG_WITNESS_FLAG: u32 = 1 << 30;

/// Witness transaction inventory type
pub const MSG_WITNESS_TX: u32 = MSG_TX | MSG_WITNESS_FLAG;

/// Witness block inventory type
pub const MSG_WITNESS_BLOCK: u32 = MSG_BLOCK | MSG_WITNESS_FLAG;

/// Convert a base inventory type to its witness variant
pub fn to_witness(inv_type: u32) -> u32 {
    inv_type | MSG_WITNESS_FLAG
}

/// True for block inventory types, with or without the witness flag
pub fn is_block_type(inv_type: u32) -> bool {
    (inv_type & !MSG_WITNESS_FLAG) == MSG_BLOCK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_witness_conversion() {
        assert_eq!(to_witness(MSG_BLOCK), MSG_WITNESS_BLOCK);
        assert_eq!(to_witness(MSG_TX), MSG_WITNESS_TX);
        // Idempotent on already-witness types.
        assert_eq!(to_witness(MSG_WITNESS_BLOCK), MSG_WITNESS_BLOCK);
    }

    #[test]
    fn test_block_type_detection() {
        assert!(is_block_type(MSG_BLOCK));
        assert!(is_block_type(MSG_WITNESS_BLOCK));
        assert!(!is_block_type(MSG_TX));
        assert!(!is_block_type(MSG_WITNESS_TX));
    }
}
