#![no_main]
use jampack::{DecodeOptions, Decoder};
use libfuzzer_sys::fuzz_target;

// Arbitrary bytes fed straight to the decoder with no out-of-band inputs supplied. Should never
// panic: malformed input is expected to surface as a `BadMagic`/`BadTag`/... `Err`, not a crash.
fuzz_target!(|data: &[u8]| {
    let mut decoder = Decoder::new(DecodeOptions::new());
    let _ = decoder.decode(data);
});
