#![no_main]

use libfuzzer_sys::fuzz_target;
use protocol::{decode_message, encode_message};
use wire::Limits;

fuzz_target!(|data: &[u8]| {
    let limits = Limits::for_testing();
    let Ok(message) = decode_message(data, &limits) else {
        return;
    };
    // Anything accepted must re-encode to something that decodes the same.
    let bytes = encode_message(&message, &limits).expect("decoded message re-encodes");
    let again = decode_message(&bytes, &limits).expect("re-encoded message decodes");
    assert_eq!(format!("{message:?}"), format!("{again:?}"));
});
