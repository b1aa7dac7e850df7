#![no_main]

use libfuzzer_sys::fuzz_target;
use uniq_estimator::{AggregateFunctionUniq, DataType, StringColumn, UniqKind};
use wyhash::wyhash;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let split_index = wyhash(data, 0) as usize % data.len();
    let (first_half, second_half) = data.split_at(split_index);
    let lhs: StringColumn = first_half.chunks(4).collect();
    let rhs: StringColumn = second_half.chunks(4).collect();

    for kind in [UniqKind::Uniq, UniqKind::UniqHll12, UniqKind::UniqExact] {
        let uniq = AggregateFunctionUniq::new(kind, &[DataType::String]).unwrap();

        let mut state1 = uniq.create_state();
        for row in 0..first_half.chunks(4).len() {
            uniq.add(&mut state1, &[&lhs], row);
            assert!(uniq.result(&state1) > 0);
        }

        let mut state2 = uniq.create_state();
        for row in 0..second_half.chunks(4).len() {
            uniq.add(&mut state2, &[&rhs], row);
            assert!(uniq.result(&state2) > 0);
        }

        let mut forward = state1.clone();
        uniq.merge(&mut forward, &state2);
        let mut backward = state2;
        uniq.merge(&mut backward, &state1);
        assert_eq!(uniq.result(&forward), uniq.result(&backward));

        let mut buf = Vec::new();
        uniq.serialize(&forward, &mut buf).unwrap();
        let restored = uniq.deserialize_bytes(&buf).unwrap();
        assert_eq!(uniq.result(&restored), uniq.result(&forward));
    }
});
