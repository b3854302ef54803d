//! Property-based tests for the toss-to-hexagram pipeline

use super::coin::{CoinFace, Line};
use super::entropy::{motion_seed, EntropySource, MotionEntropy};
use super::hexagram::{resolve, HexagramCode, LINE_COUNT};
use super::table::HexagramTable;
use crate::motion::MotionSample;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn arb_face() -> impl Strategy<Value = CoinFace> {
    prop_oneof![Just(CoinFace::Heads), Just(CoinFace::Tails)]
}

fn arb_line() -> impl Strategy<Value = Line> {
    [arb_face(), arb_face(), arb_face()].prop_map(Line::from_faces)
}

fn arb_lines() -> impl Strategy<Value = [Line; LINE_COUNT]> {
    [
        arb_line(),
        arb_line(),
        arb_line(),
        arb_line(),
        arb_line(),
        arb_line(),
    ]
}

fn arb_sample() -> impl Strategy<Value = MotionSample> {
    (-40.0f64..40.0, -40.0f64..40.0, -40.0f64..40.0, 0u64..1_000_000)
        .prop_map(|(x, y, z, t)| MotionSample::new(x, y, z, t))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Line value follows the heads majority; changing iff unanimous
    #[test]
    fn prop_line_matches_faces(faces in [arb_face(), arb_face(), arb_face()]) {
        let line = Line::from_faces(faces);
        let heads = faces.iter().filter(|f| **f == CoinFace::Heads).count();
        prop_assert_eq!(line.value(), u8::from(heads >= 2));
        prop_assert_eq!(line.changing(), heads == 0 || heads == 3);
    }

    // Resolution is a pure function of its lines
    #[test]
    fn prop_resolve_is_deterministic(lines in arb_lines()) {
        let table = HexagramTable::builtin().unwrap();
        prop_assert_eq!(resolve(&lines, &table), resolve(&lines, &table));
    }

    // Changed code differs from primary exactly at the changing positions
    #[test]
    fn prop_changed_code_flips_only_changing_lines(lines in arb_lines()) {
        let table = HexagramTable::builtin().unwrap();
        let reading = resolve(&lines, &table);
        let expected: Vec<usize> = (0..LINE_COUNT).filter(|i| lines[*i].changing()).collect();

        match reading.changed_code {
            Some(changed) => {
                prop_assert!(reading.has_changes);
                prop_assert_eq!(reading.primary_code.diff(changed), expected);
            }
            None => {
                prop_assert!(!reading.has_changes);
                prop_assert!(reading.changed.is_none());
                prop_assert!(expected.is_empty());
            }
        }
    }

    // Line i of the code is line i of the throw
    #[test]
    fn prop_code_preserves_throw_order(lines in arb_lines()) {
        let code = HexagramCode::from_lines(&lines);
        let rendered = code.to_string();
        for (i, c) in rendered.chars().enumerate() {
            prop_assert_eq!(c == '1', lines[i].is_yang());
        }
        prop_assert_eq!(rendered.parse::<HexagramCode>().unwrap(), code);
    }

    // A usable motion seed fully determines the faces
    #[test]
    fn prop_motion_faces_depend_only_on_sample(sample in arb_sample(), a in any::<u64>(), b in any::<u64>()) {
        prop_assume!(motion_seed(&sample).is_some());
        let mut left = MotionEntropy::with_rng(StdRng::seed_from_u64(a));
        let mut right = MotionEntropy::with_rng(StdRng::seed_from_u64(b));
        prop_assert_eq!(left.draw_faces(Some(&sample)), right.draw_faces(Some(&sample)));
    }
}
