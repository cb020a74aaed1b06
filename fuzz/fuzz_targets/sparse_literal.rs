#![no_main]

use braid_core::SparseVector;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let Ok((weights, dimension)) = SparseVector::parse_literal(input) else {
        return;
    };
    // anything that parses must survive a literal round trip
    let literal = weights.to_literal(dimension);
    let (again, again_dimension) =
        SparseVector::parse_literal(&literal).expect("re-encoded literal parses");
    assert_eq!(again_dimension, dimension);
    assert_eq!(again.len(), weights.len());
});
