#![no_main]

use libfuzzer_sys::fuzz_target;
use uniq_estimator::{AggregateFunctionUniq, DataType, UniqKind, VectorColumn};

fuzz_target!(|data: &[u8]| {
    let column = VectorColumn::new(vec![1u64]);
    for (kind, data_type) in [
        (UniqKind::Uniq, DataType::UInt64),
        (UniqKind::UniqHll12, DataType::UInt64),
        (UniqKind::UniqExact, DataType::UInt64),
        (UniqKind::UniqExact, DataType::String),
    ] {
        let uniq = AggregateFunctionUniq::new(kind, &[data_type]).unwrap();
        if let Ok(mut state) = uniq.deserialize_bytes(data) {
            let before = uniq.result(&state);
            if kind == UniqKind::UniqExact {
                uniq.add(&mut state, &[&column], 0);
                assert!(uniq.result(&state) >= before.max(1));
            }
        }
    }
});
