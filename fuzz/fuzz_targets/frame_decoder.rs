#![no_main]

use libfuzzer_sys::fuzz_target;
use wire::{FrameDecoder, Limits};

fuzz_target!(|data: &[u8]| {
    let limits = Limits::for_testing();
    let mut decoder = FrameDecoder::new(limits);

    // First byte picks the chunk size so partial reads get exercised.
    let Some((&chunk, rest)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(chunk % 32) + 1;
    for piece in rest.chunks(chunk) {
        decoder.push(piece);
        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => assert!(frame.len() <= limits.max_frame_bytes),
                Ok(None) => break,
                Err(_) => return,
            }
        }
    }
});
