use std::fmt;

/// Fixed-width bit-vector value. Bits are stored least significant first.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitVec {
    bits: Vec<bool>,
}

fn ult_bits(a: &[bool], b: &[bool]) -> bool {
    for (x, y) in a.iter().zip(b.iter()).rev() {
        if x != y {
            return *y;
        }
    }
    false
}

fn add_bits(a: &[bool], b: &[bool], mut carry: bool) -> Vec<bool> {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let sum = x ^ y ^ carry;
            carry = (x & y) | (carry & (x ^ y));
            sum
        })
        .collect()
}

fn sub_bits(a: &[bool], b: &[bool]) -> Vec<bool> {
    let inverted: Vec<bool> = b.iter().map(|x| !x).collect();
    add_bits(a, &inverted, true)
}

impl BitVec {
    pub fn zero(width: u32) -> Self {
        Self {
            bits: vec![false; width as usize],
        }
    }

    pub fn ones(width: u32) -> Self {
        Self {
            bits: vec![true; width as usize],
        }
    }

    pub fn one(width: u32) -> Self {
        let mut bv = Self::zero(width);
        if let Some(lsb) = bv.bits.first_mut() {
            *lsb = true;
        }
        bv
    }

    /// Truncates `value` to `width` bits, padding with zeroes.
    pub fn from_u64(width: u32, value: u64) -> Self {
        let bits = (0..width).map(|i| i < 64 && (value >> i) & 1 == 1).collect();
        Self { bits }
    }

    /// Truncates `value` to `width` bits, padding with its sign.
    pub fn from_i64(width: u32, value: i64) -> Self {
        let bits = (0..width).map(|i| (value >> i.min(63)) & 1 == 1).collect();
        Self { bits }
    }

    /// Parses a string over `0` and `1`, most significant bit first.
    pub fn from_bin(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        let mut bits = Vec::with_capacity(s.len());
        for c in s.chars().rev() {
            match c {
                '0' => bits.push(false),
                '1' => bits.push(true),
                _ => return None,
            }
        }
        Some(Self { bits })
    }

    pub(crate) fn from_bits(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    pub fn width(&self) -> u32 {
        self.bits.len() as u32
    }

    pub fn bit(&self, i: u32) -> bool {
        self.bits.get(i as usize).copied().unwrap_or(false)
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn msb(&self) -> bool {
        self.bits.last().copied().unwrap_or(false)
    }

    pub fn is_zero(&self) -> bool {
        self.bits.iter().all(|b| !b)
    }

    pub fn is_ones(&self) -> bool {
        self.bits.iter().all(|b| *b)
    }

    pub fn is_one(&self) -> bool {
        self.bit(0) && self.bits.iter().skip(1).all(|b| !b)
    }

    pub fn to_u64(&self) -> Option<u64> {
        if self.bits.iter().skip(64).any(|b| *b) {
            return None;
        }
        Some(
            self.bits
                .iter()
                .take(64)
                .enumerate()
                .fold(0, |acc, (i, b)| acc | ((*b as u64) << i)),
        )
    }

    pub fn to_bin_string(&self) -> String {
        self.bits
            .iter()
            .rev()
            .map(|b| if *b { '1' } else { '0' })
            .collect()
    }

    pub fn invert(&self) -> Self {
        Self::from_bits(self.bits.iter().map(|b| !b).collect())
    }

    pub fn and(&self, other: &Self) -> Self {
        Self::from_bits(self.zip_with(other, |a, b| a & b))
    }

    pub fn or(&self, other: &Self) -> Self {
        Self::from_bits(self.zip_with(other, |a, b| a | b))
    }

    pub fn xor(&self, other: &Self) -> Self {
        Self::from_bits(self.zip_with(other, |a, b| a ^ b))
    }

    fn zip_with(&self, other: &Self, f: impl Fn(bool, bool) -> bool) -> Vec<bool> {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .map(|(a, b)| f(*a, *b))
            .collect()
    }

    pub fn add(&self, other: &Self) -> Self {
        Self::from_bits(add_bits(&self.bits, &other.bits, false))
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self::from_bits(sub_bits(&self.bits, &other.bits))
    }

    pub fn neg(&self) -> Self {
        Self::zero(self.width()).sub(self)
    }

    pub fn inc(&self) -> Self {
        self.add(&Self::one(self.width()))
    }

    pub fn dec(&self) -> Self {
        self.sub(&Self::one(self.width()))
    }

    pub fn mul(&self, other: &Self) -> Self {
        let width = self.bits.len();
        let mut acc = vec![false; width];
        for (i, b) in other.bits.iter().enumerate() {
            if !*b {
                continue;
            }
            let mut shifted = vec![false; width];
            shifted[i..].copy_from_slice(&self.bits[..width - i]);
            acc = add_bits(&acc, &shifted, false);
        }
        Self::from_bits(acc)
    }

    pub fn ult(&self, other: &Self) -> bool {
        ult_bits(&self.bits, &other.bits)
    }

    pub fn slt(&self, other: &Self) -> bool {
        match (self.msb(), other.msb()) {
            (true, false) => true,
            (false, true) => false,
            _ => self.ult(other),
        }
    }

    // Restoring division with a remainder one bit wider than the operands.
    fn divmod(&self, divisor: &Self) -> (Self, Self) {
        let width = self.bits.len();
        if divisor.is_zero() {
            return (Self::ones(width as u32), self.clone());
        }
        let mut quotient = vec![false; width];
        let mut rem = vec![false; width + 1];
        let mut wide = divisor.bits.clone();
        wide.push(false);
        for i in (0..width).rev() {
            rem.pop();
            rem.insert(0, self.bits[i]);
            if !ult_bits(&rem, &wide) {
                rem = sub_bits(&rem, &wide);
                quotient[i] = true;
            }
        }
        rem.truncate(width);
        (Self::from_bits(quotient), Self::from_bits(rem))
    }

    /// Unsigned division. Division by zero yields all ones.
    pub fn udiv(&self, other: &Self) -> Self {
        self.divmod(other).0
    }

    /// Unsigned remainder. The remainder by zero is the dividend.
    pub fn urem(&self, other: &Self) -> Self {
        self.divmod(other).1
    }

    fn shift_amount(&self, shift: &Self) -> Option<usize> {
        shift
            .to_u64()
            .filter(|s| *s < self.bits.len() as u64)
            .map(|s| s as usize)
    }

    pub fn sll(&self, shift: &Self) -> Self {
        let width = self.bits.len();
        match self.shift_amount(shift) {
            Some(s) => {
                let mut bits = vec![false; width];
                bits[s..].copy_from_slice(&self.bits[..width - s]);
                Self::from_bits(bits)
            }
            None => Self::zero(width as u32),
        }
    }

    pub fn srl(&self, shift: &Self) -> Self {
        let width = self.bits.len();
        match self.shift_amount(shift) {
            Some(s) => {
                let mut bits = vec![false; width];
                bits[..width - s].copy_from_slice(&self.bits[s..]);
                Self::from_bits(bits)
            }
            None => Self::zero(width as u32),
        }
    }

    /// Bits `upper` down to `lower`, both inclusive. Bounds are checked by the caller.
    pub fn slice(&self, upper: u32, lower: u32) -> Self {
        Self::from_bits(self.bits[lower as usize..=upper as usize].to_vec())
    }

    /// `self` becomes the most significant part of the result.
    pub fn concat(&self, low: &Self) -> Self {
        let mut bits = low.bits.clone();
        bits.extend_from_slice(&self.bits);
        Self::from_bits(bits)
    }

    pub fn uext(&self, width: u32) -> Self {
        Self::zero(width).concat(self)
    }

    pub fn sext(&self, width: u32) -> Self {
        if self.msb() {
            Self::ones(width).concat(self)
        } else {
            self.uext(width)
        }
    }
}

impl fmt::Display for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bin_string())
    }
}

impl fmt::Debug for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#b{}", self.to_bin_string())
    }
}

#[cfg(test)]
mod test {
    use super::BitVec;
    use proptest::prelude::*;

    fn bv8(v: u64) -> BitVec {
        BitVec::from_u64(8, v)
    }

    #[test]
    fn parse_and_print() {
        let bv = BitVec::from_bin("0110").unwrap();
        assert_eq!(bv.width(), 4);
        assert_eq!(bv.to_u64(), Some(6));
        assert_eq!(bv.to_string(), "0110");
        assert!(BitVec::from_bin("01x").is_none());
        assert!(BitVec::from_bin("").is_none());
    }

    #[test]
    fn signed_constants() {
        assert_eq!(BitVec::from_i64(8, -1), BitVec::ones(8));
        assert_eq!(BitVec::from_i64(8, -2).to_u64(), Some(254));
        assert_eq!(BitVec::from_i64(70, -1), BitVec::ones(70));
    }

    #[test]
    fn division_by_zero() {
        let zero = bv8(0);
        assert_eq!(bv8(13).udiv(&zero), BitVec::ones(8));
        assert_eq!(bv8(13).urem(&zero), bv8(13));
    }

    #[test]
    fn slices_and_extensions() {
        let bv = bv8(0b1011_0010);
        assert_eq!(bv.slice(7, 4).to_u64(), Some(0b1011));
        assert_eq!(bv.slice(0, 0).to_u64(), Some(0));
        assert_eq!(bv.sext(4).to_u64(), Some(0xfb2));
        assert_eq!(bv.uext(4).to_u64(), Some(0x0b2));
        assert_eq!(bv8(1).concat(&bv8(2)).to_u64(), Some(0x0102));
    }

    #[test]
    fn shifts_past_width() {
        assert_eq!(bv8(0xff).sll(&bv8(8)), bv8(0));
        assert_eq!(bv8(0xff).srl(&bv8(3)), bv8(0x1f));
        assert_eq!(bv8(0x81).sll(&bv8(1)), bv8(0x02));
    }

    #[test]
    fn signed_compare() {
        assert!(bv8(0xff).slt(&bv8(0)));
        assert!(!bv8(1).slt(&bv8(0xff)));
        assert!(bv8(0x80).slt(&bv8(0x81)));
    }

    proptest! {
        #[test]
        fn arithmetic_matches_u8(a in any::<u8>(), b in any::<u8>()) {
            let (x, y) = (bv8(a as u64), bv8(b as u64));
            prop_assert_eq!(x.add(&y).to_u64(), Some(a.wrapping_add(b) as u64));
            prop_assert_eq!(x.sub(&y).to_u64(), Some(a.wrapping_sub(b) as u64));
            prop_assert_eq!(x.mul(&y).to_u64(), Some(a.wrapping_mul(b) as u64));
            prop_assert_eq!(x.ult(&y), a < b);
            prop_assert_eq!(x.slt(&y), (a as i8) < (b as i8));
            if b != 0 {
                prop_assert_eq!(x.udiv(&y).to_u64(), Some((a / b) as u64));
                prop_assert_eq!(x.urem(&y).to_u64(), Some((a % b) as u64));
            }
        }

        #[test]
        fn negation_is_additive_inverse(a in any::<u8>()) {
            let x = bv8(a as u64);
            prop_assert!(x.add(&x.neg()).is_zero());
            prop_assert_eq!(x.invert().invert(), x);
        }
    }
}
