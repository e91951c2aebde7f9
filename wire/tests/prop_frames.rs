use proptest::prelude::*;
use wire::{encode_frame, ByteReader, ByteWriter, FrameDecoder, LimitKind, Limits};

proptest! {
    #[test]
    fn prop_frames_survive_arbitrary_chunking(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..16),
        chunk in 1usize..17,
    ) {
        let limits = Limits::for_testing();
        let mut stream = Vec::new();
        for payload in &payloads {
            stream.extend(encode_frame(payload, &limits).unwrap());
        }

        let mut decoder = FrameDecoder::new(limits);
        let mut decoded = Vec::new();
        for piece in stream.chunks(chunk) {
            decoder.push(piece);
            while let Some(frame) = decoder.next_frame().unwrap() {
                decoded.push(frame);
            }
        }

        prop_assert_eq!(decoded, payloads);
        prop_assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn prop_cursor_roundtrip(
        a in any::<u32>(),
        b in any::<u16>(),
        c in any::<u32>(),
        text in "[a-zA-Z0-9_]{0,16}",
    ) {
        let mut writer = ByteWriter::new();
        writer.write_varu32(a);
        writer.write_u16(b);
        writer.write_f32(f32::from_bits(c));
        writer.write_str(&text, 16, LimitKind::TextLength).unwrap();
        let bytes = writer.finish();

        let mut reader = ByteReader::new(&bytes);
        prop_assert_eq!(reader.read_varu32().unwrap(), a);
        prop_assert_eq!(reader.read_u16().unwrap(), b);
        prop_assert_eq!(reader.read_f32().unwrap().to_bits(), c);
        prop_assert_eq!(reader.read_str(16, LimitKind::TextLength).unwrap(), text.as_str());
        prop_assert!(reader.finish().is_ok());
    }

    #[test]
    fn prop_reader_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut reader = ByteReader::new(&bytes);
        let _ = reader.read_varu32();
        let _ = reader.read_str(8, LimitKind::KindLength);
        let _ = reader.read_f32();
        let _ = reader.finish();
    }
}
