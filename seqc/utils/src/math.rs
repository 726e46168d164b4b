use std::cmp;

fn bits_helper(n: u64, i: u64) -> u64 {
    if n == 0 {
        i
    } else {
        bits_helper(n / 2, i + 1)
    }
}

/// Number of bits needed to address `n` distinct values: `ceil(log2(n))`,
/// never less than one.
pub fn bits_needed_for(n: u64) -> u64 {
    cmp::max(bits_helper(n.saturating_sub(1), 0), 1)
}

/// All ones in the low `width` bits.
pub fn mask(width: u64) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// Two's complement encoding of `value` truncated to `width` bits.
pub fn encode(value: i64, width: u64) -> u128 {
    (value as i128 as u128) & mask(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths() {
        assert_eq!(bits_needed_for(0), 1);
        assert_eq!(bits_needed_for(1), 1);
        assert_eq!(bits_needed_for(2), 1);
        assert_eq!(bits_needed_for(3), 2);
        assert_eq!(bits_needed_for(5), 3);
        assert_eq!(bits_needed_for(8), 3);
        assert_eq!(bits_needed_for(9), 4);
        assert_eq!(bits_needed_for(17), 5);
    }

    #[test]
    fn negative_values_wrap_into_width() {
        assert_eq!(encode(-1, 4), 0b1111);
        assert_eq!(encode(-8, 4), 0b1000);
        assert_eq!(encode(300, 8), 44);
        assert_eq!(mask(128), u128::MAX);
    }
}
