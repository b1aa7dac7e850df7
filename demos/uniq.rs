use uniq_estimator::{AggregateFunctionUniq, Column, DataType, StringColumn, UniqKind, VectorColumn};

fn main() {
    let ids: VectorColumn<u64> = (0..100_000u64).map(|i| i % 25_000).collect();
    let names: StringColumn = (0..100_000u64).map(|i| format!("user-{}", i % 1_000)).collect();

    for kind in [UniqKind::Uniq, UniqKind::UniqHll12, UniqKind::UniqExact] {
        let uniq = AggregateFunctionUniq::new(kind, &[DataType::UInt64, DataType::String]).unwrap();

        // two partial states, e.g. computed on different nodes
        let mut state1 = uniq.create_state();
        uniq.add_batch(&mut state1, &[&ids, &names], 0..50_000);
        println!("{kind}(id, name) state1 = {}", uniq.result(&state1));

        let mut state2 = uniq.create_state();
        uniq.add_batch(&mut state2, &[&ids, &names], 50_000..ids.len());
        println!("{kind}(id, name) state2 = {}", uniq.result(&state2));

        let mut bytes = Vec::new();
        uniq.serialize(&state2, &mut bytes).unwrap();
        let state2 = uniq.deserialize_bytes(&bytes).unwrap();

        uniq.merge(&mut state1, &state2);
        println!(
            "{kind}(id, name) merged = {}, {} bytes shipped",
            uniq.result(&state1),
            bytes.len()
        );
    }
}
