//! Closed address ranges, and the conversions between a [`Range`] and the
//! minimal set of [`Ipv4Net`] prefixes that cover it exactly.

use crate::types::prefix::{mask_for, Ipv4Net, MAX_LEN};

/// A closed interval `[first, last]` of 32-bit addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub first: u32,
    pub last: u32,
}

impl Range {
    pub fn new(first: u32, last: u32) -> Self {
        debug_assert!(first <= last);
        Range { first, last }
    }

    pub fn of(prefix: &Ipv4Net) -> Self {
        Range { first: prefix.first(), last: prefix.last() }
    }

    /// Decompose this range into the minimal set of prefixes whose union is
    /// exactly this range. At most `2 * 32` prefixes.
    pub fn to_prefixes(&self) -> Vec<Ipv4Net> {
        let mut out = Vec::new();
        decompose_into(*self, &mut out);
        out
    }

    /// `self \ sub`: the 0, 1, or 2 sub-ranges of `self` that remain after
    /// removing `sub`. `sub` need not be contained in `self`; only the
    /// overlapping part is removed.
    pub fn subtract(&self, sub: &Range) -> Vec<Range> {
        let mut out = Vec::new();
        if sub.last < self.first || sub.first > self.last {
            out.push(*self);
            return out;
        }
        if sub.first > self.first {
            out.push(Range::new(self.first, sub.first - 1));
        }
        if sub.last < self.last {
            out.push(Range::new(sub.last + 1, self.last));
        }
        out
    }
}

fn decompose_into(range: Range, out: &mut Vec<Ipv4Net>) {
    let xor = range.first ^ range.last;
    let common = if xor == 0 { MAX_LEN } else { xor.leading_zeros() as u8 };
    let xor_plus_one = u64::from(xor) + 1;
    let is_power_of_two = xor_plus_one & (xor_plus_one - 1) == 0;
    let is_single_prefix = is_power_of_two && (range.first & !mask_for(common)) == 0;

    if is_single_prefix {
        out.push(Ipv4Net::from_bits(range.first, common));
        return;
    }

    // Split at the smallest address in the range whose low
    // `32 - common - 1` bits are zero (the next power-of-two aligned
    // boundary strictly above `first`).
    let pivot_len = common + 1;
    let pivot = (range.first & mask_for(pivot_len)).wrapping_add(1 << (MAX_LEN - pivot_len));
    decompose_into(Range::new(range.first, pivot - 1), out);
    decompose_into(Range::new(pivot, range.last), out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(a: u8, b: u8, c: u8, d: u8) -> u32 {
        u32::from(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn single_prefix_range_round_trips() {
        let p = Ipv4Net::new(Ipv4Addr::new(10, 0, 0, 0), 24).unwrap();
        let r = Range::of(&p);
        let prefixes = r.to_prefixes();
        assert_eq!(prefixes, vec![p]);
    }

    #[test]
    fn odd_range_decomposes_to_minimal_cover() {
        // 10.0.0.0 - 10.0.0.2 -> /31 + /32
        let r = Range::new(ip(10, 0, 0, 0), ip(10, 0, 0, 2));
        let prefixes = r.to_prefixes();
        let lens: Vec<u8> = prefixes.iter().map(|p| p.len()).collect();
        assert_eq!(lens, vec![31, 32]);
        // union covers exactly the range
        let covered: u64 = prefixes
            .iter()
            .map(|p| 1u64 << (32 - p.len()))
            .sum();
        assert_eq!(covered, 3);
    }

    #[test]
    fn subtract_splits_into_two_halves() {
        let outer = Range::new(ip(10, 0, 0, 0), ip(10, 0, 0, 255));
        let hole = Range::new(ip(10, 0, 0, 100), ip(10, 0, 0, 100));
        let rest = outer.subtract(&hole);
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0], Range::new(ip(10, 0, 0, 0), ip(10, 0, 0, 99)));
        assert_eq!(rest[1], Range::new(ip(10, 0, 0, 101), ip(10, 0, 0, 255)));
    }

    #[test]
    fn subtract_disjoint_is_noop() {
        let a = Range::new(ip(10, 0, 0, 0), ip(10, 0, 0, 10));
        let b = Range::new(ip(10, 0, 1, 0), ip(10, 0, 1, 10));
        assert_eq!(a.subtract(&b), vec![a]);
    }
}
