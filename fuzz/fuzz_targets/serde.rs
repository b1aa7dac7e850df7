#![no_main]

use libfuzzer_sys::fuzz_target;
use uniq_estimator::{DistinctSet, UniqState};

fuzz_target!(|data: &[u8]| {
    if let Ok(mut state) = serde_json::from_slice::<UniqState>(data) {
        let copy = state.clone();
        state.merge(&copy);
        assert!(state.size_of() > 0);
        // merging a state with itself adds no new values
        assert_eq!(state.size(), copy.size());
    }
});
