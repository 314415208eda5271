use std::cmp;

fn bits_helper(n: u64, i: u64) -> u64 {
    if n == 0 {
        i
    } else {
        bits_helper(n / 2, i + 1)
    }
}

/// Number of bits needed to enumerate `n` distinct values.
pub fn bits_needed_for(n: u64) -> u64 {
    cmp::max(bits_helper(n.saturating_sub(1), 0), 1)
}

/// Number of bits needed to represent the magnitude `v` (at least one).
pub fn bit_width(v: u128) -> u32 {
    cmp::max(128 - v.leading_zeros(), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths() {
        assert_eq!(bits_needed_for(1), 1);
        assert_eq!(bits_needed_for(2), 1);
        assert_eq!(bits_needed_for(3), 2);
        assert_eq!(bits_needed_for(4), 2);
        assert_eq!(bits_needed_for(5), 3);
        assert_eq!(bit_width(0), 1);
        assert_eq!(bit_width(1), 1);
        assert_eq!(bit_width(255), 8);
        assert_eq!(bit_width(256), 9);
    }
}
