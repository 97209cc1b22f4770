#![no_main]
use jampack::{DecodeOptions, Decoder};
use libfuzzer_sys::fuzz_target;

// Same arbitrary input, but with a key dictionary and encryption key supplied out-of-band, to
// exercise the `KeyStripped`/`EncryptionExcluded` decode paths that `decode_buffer` never reaches.
fuzz_target!(|data: &[u8]| {
    let options = DecodeOptions::new()
        .keys_array(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        .encryption_key(0x1234_5678);
    let mut decoder = Decoder::new(options);
    let _ = decoder.decode(data);
});
