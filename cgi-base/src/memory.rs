/// Round `value` up to the next multiple of `alignment`. `alignment` must be a power of two.
pub fn align_up(
    value: u64,
    alignment: u64,
) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Number of blocks of `block_size` needed to cover `value`
pub fn div_round_up(
    value: u32,
    block_size: u32,
) -> u32 {
    value / block_size + u32::from(value % block_size != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }

    #[test]
    fn div_round_up_counts_partial_blocks() {
        assert_eq!(div_round_up(1, 4), 1);
        assert_eq!(div_round_up(4, 4), 1);
        assert_eq!(div_round_up(5, 4), 2);
        assert_eq!(div_round_up(u32::MAX, 4), 1 << 30);
    }
}
