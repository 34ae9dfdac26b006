#![no_main]
use libfuzzer_sys::fuzz_target;
use netiso_core::{FrameSiteMode, PartitionKey, SchemeRegistry};
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = ciborium::de::from_reader::<Value, _>(data) else {
        return;
    };
    let schemes = SchemeRegistry::new();
    let Ok(key) = PartitionKey::from_value(&value, &schemes) else {
        return;
    };
    // Accepted keys are persistable and stable after one normalization.
    for mode in FrameSiteMode::ALL {
        let again = key.to_value(mode).expect("restored keys are persistable");
        let twice = PartitionKey::from_value(&again, &schemes).expect("re-decodes");
        assert!(key.eq_in(&twice, mode));
    }
});
