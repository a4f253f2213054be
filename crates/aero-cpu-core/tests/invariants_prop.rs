//! Universal arithmetic/logic invariants (§8) that must hold regardless of
//! operand value: addition commutes, double complement is identity,
//! popcount of a value and its complement always sums to the operand
//! width, and shift-count masking never panics or drifts outside the
//! masked range.

use aero_cpu_core::interp::{int_arith, scan, shift_rotate};
use aero_cpu_core::state::RFlags;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 512,
        rng_algorithm: proptest::test_runner::RngAlgorithm::ChaCha,
        rng_seed: proptest::test_runner::RngSeed::Fixed(0x4EE0_CAFE),
        .. ProptestConfig::default()
    })]

    #[test]
    fn add32_is_commutative(a in any::<u32>(), b in any::<u32>()) {
        let mut fa = RFlags::empty();
        let mut fb = RFlags::empty();
        let r1 = int_arith::add32(&mut fa, a, b);
        let r2 = int_arith::add32(&mut fb, b, a);
        prop_assert_eq!(r1, r2);
        prop_assert_eq!(fa, fb);
    }

    #[test]
    fn add64_is_commutative(a in any::<u64>(), b in any::<u64>()) {
        let mut fa = RFlags::empty();
        let mut fb = RFlags::empty();
        let r1 = int_arith::add64(&mut fa, a, b);
        let r2 = int_arith::add64(&mut fb, b, a);
        prop_assert_eq!(r1, r2);
        prop_assert_eq!(fa, fb);
    }

    #[test]
    fn double_complement_is_identity_32(a in any::<u32>()) {
        let mut f = RFlags::empty();
        let once = int_arith::neg32(&mut f, a);
        let twice = int_arith::neg32(&mut f, once);
        prop_assert_eq!(twice, a);
    }

    #[test]
    fn double_complement_is_identity_64(a in any::<u64>()) {
        let mut f = RFlags::empty();
        let once = int_arith::neg64(&mut f, a);
        let twice = int_arith::neg64(&mut f, once);
        prop_assert_eq!(twice, a);
    }

    #[test]
    fn popcount_of_value_and_complement_sums_to_width_32(a in any::<u32>()) {
        let mut f = RFlags::empty();
        let ones = scan::popcnt32(&mut f, a);
        let zeros = scan::popcnt32(&mut f, !a);
        prop_assert_eq!(ones + zeros, 32);
    }

    #[test]
    fn popcount_of_value_and_complement_sums_to_width_64(a in any::<u64>()) {
        let mut f = RFlags::empty();
        let ones = scan::popcnt64(&mut f, a);
        let zeros = scan::popcnt64(&mut f, !a);
        prop_assert_eq!(ones + zeros, 64);
    }

    #[test]
    fn shl32_count_is_masked_to_five_bits(a in any::<u32>(), count in any::<u32>()) {
        let mut f_masked = RFlags::empty();
        let mut f_raw = RFlags::empty();
        let masked_count = count & 31;
        let r_masked = shift_rotate::shl32(&mut f_masked, a, masked_count);
        let r_raw = shift_rotate::shl32(&mut f_raw, a, count);
        prop_assert_eq!(r_masked, r_raw);
        prop_assert_eq!(f_masked, f_raw);
    }

    #[test]
    fn shl64_count_is_masked_to_six_bits(a in any::<u64>(), count in any::<u32>()) {
        let mut f_masked = RFlags::empty();
        let mut f_raw = RFlags::empty();
        let masked_count = count & 63;
        let r_masked = shift_rotate::shl64(&mut f_masked, a, masked_count);
        let r_raw = shift_rotate::shl64(&mut f_raw, a, count);
        prop_assert_eq!(r_masked, r_raw);
        prop_assert_eq!(f_masked, f_raw);
    }
}

#[test]
fn shl32_never_panics_at_boundary_counts() {
    let mut f = RFlags::empty();
    for count in [0u32, 1, 31, 32, 63, 64, u32::MAX] {
        let _ = shift_rotate::shl32(&mut f, 0xABCD_1234, count);
    }
}
