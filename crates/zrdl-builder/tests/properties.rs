//! Property-based invariants from spec §8 "Invariants (property-based)".

use proptest::prelude::*;
use zrdl_builder::{BuildCaps, DrawlistBuilder, Version};
use zrdl_wire::{align4, read_u32_le};

#[derive(Debug, Clone)]
enum Op {
    Clear,
    FillRect(i32, i32, u16, u16),
    DrawText(i32, i32, String),
    PushClip(i32, i32, u16, u16),
    PopClip,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Clear),
        (any::<i32>(), any::<i32>(), 0u16..200, 0u16..200)
            .prop_map(|(x, y, w, h)| Op::FillRect(x, y, w, h)),
        (any::<i32>(), any::<i32>(), "[a-z]{0,12}").prop_map(|(x, y, s)| Op::DrawText(x, y, s)),
        (any::<i32>(), any::<i32>(), 0u16..200, 0u16..200)
            .prop_map(|(x, y, w, h)| Op::PushClip(x, y, w, h)),
        Just(Op::PopClip),
    ]
}

fn apply(b: &mut DrawlistBuilder, op: &Op) {
    let _ = match op {
        Op::Clear => b.clear(),
        Op::FillRect(x, y, w, h) => b.fill_rect(*x, *y, *w as i32, *h as i32, None),
        Op::DrawText(x, y, s) => b.draw_text(*x, *y, s, None),
        Op::PushClip(x, y, w, h) => b.push_clip(*x, *y, *w as i32, *h as i32),
        Op::PopClip => b.pop_clip(),
    };
}

proptest! {
    /// Header parses, every offset is 4-aligned, and total_size matches the
    /// sum-of-sections formula, for any sequence of legal builder calls.
    #[test]
    fn header_and_total_size_are_consistent(ops in prop::collection::vec(arb_op(), 0..20)) {
        let mut b = DrawlistBuilder::new(Version::V3, BuildCaps::default());
        for op in &ops {
            apply(&mut b, op);
        }
        if b.error().is_some() {
            return Ok(());
        }
        let bytes = b.build().unwrap();
        let field = |idx: usize| read_u32_le(&bytes, idx * 4).unwrap();

        let magic = field(0);
        let total_size = field(3);
        let cmd_offset = field(4);
        let cmd_bytes = field(5);
        let strings_span_offset = field(7);
        let strings_count = field(8);
        let strings_bytes_offset = field(9);
        let strings_bytes_len = field(10);
        let blobs_span_offset = field(11);
        let blobs_count = field(12);
        let blobs_bytes_offset = field(13);
        let blobs_bytes_len = field(14);

        prop_assert_eq!(magic, zrdl_builder::HEADER_MAGIC);
        for offset in [cmd_offset, strings_span_offset, strings_bytes_offset, blobs_span_offset, blobs_bytes_offset, total_size] {
            prop_assert_eq!(offset % 4, 0);
        }
        let expected_total = 64
            + cmd_bytes
            + strings_count * 8
            + align4(strings_bytes_len)
            + blobs_count * 8
            + align4(blobs_bytes_len);
        prop_assert_eq!(total_size, expected_total);
        prop_assert_eq!(bytes.len() as u32, total_size);
    }

    /// Adding the same string twice always yields the same span index, and
    /// that span's bytes decode back to the original string.
    #[test]
    fn string_dedup_and_round_trip(s in "[a-zA-Z0-9 ]{0,40}") {
        let mut b = DrawlistBuilder::new(Version::V3, BuildCaps::default());
        b.draw_text(0, 0, &s, None).unwrap();
        b.draw_text(1, 0, &s, None).unwrap();
        prop_assert_eq!(b.string_count(), 1);

        let bytes = b.build().unwrap();
        let strings_bytes_offset = read_u32_le(&bytes, 9 * 4).unwrap() as usize;
        let strings_span_offset = read_u32_le(&bytes, 7 * 4).unwrap() as usize;
        let span_offset = read_u32_le(&bytes, strings_span_offset).unwrap() as usize;
        let span_len = read_u32_le(&bytes, strings_span_offset + 4).unwrap() as usize;
        let decoded = std::str::from_utf8(&bytes[strings_bytes_offset + span_offset..strings_bytes_offset + span_offset + span_len]).unwrap();
        prop_assert_eq!(decoded, s.as_str());
    }

    /// A 4-aligned blob round-trips byte for byte through the blobs section.
    #[test]
    fn blob_round_trips(bytes in prop::collection::vec(any::<u8>(), 0..64).prop_map(|mut v| { while v.len() % 4 != 0 { v.push(0); } v })) {
        let mut b = DrawlistBuilder::new(Version::V3, BuildCaps::default());
        let idx = b.add_blob(&bytes).unwrap();
        b.draw_text_run(0, 0, idx).unwrap();
        let built = b.build().unwrap();

        let blobs_span_offset = read_u32_le(&built, 11 * 4).unwrap() as usize;
        let blobs_bytes_offset = read_u32_le(&built, 13 * 4).unwrap() as usize;
        let span_offset = read_u32_le(&built, blobs_span_offset).unwrap() as usize;
        let span_len = read_u32_le(&built, blobs_span_offset + 4).unwrap() as usize;
        prop_assert_eq!(span_len, bytes.len());
        prop_assert_eq!(&built[blobs_bytes_offset + span_offset..blobs_bytes_offset + span_offset + span_len], &bytes[..]);
    }

    /// Two builders with identical caps fed identical call sequences produce
    /// byte-identical drawlists.
    #[test]
    fn determinism(ops in prop::collection::vec(arb_op(), 0..20)) {
        let mut a = DrawlistBuilder::new(Version::V3, BuildCaps::default());
        let mut b = DrawlistBuilder::new(Version::V3, BuildCaps::default());
        for op in &ops {
            apply(&mut a, op);
            apply(&mut b, op);
        }
        match (a.build(), b.build()) {
            (Ok(ba), Ok(bb)) => prop_assert_eq!(&*ba, &*bb),
            (Err(ea), Err(eb)) => prop_assert_eq!(ea, eb),
            _ => prop_assert!(false, "builders diverged on success/failure"),
        }
    }

    /// Command sizes match their declared opcodes, and the stream length
    /// equals the sum of per-command align4(size).
    #[test]
    fn command_stream_length_matches_sizes(ops in prop::collection::vec(arb_op(), 0..20)) {
        let mut b = DrawlistBuilder::new(Version::V3, BuildCaps::default());
        for op in &ops {
            apply(&mut b, op);
        }
        if b.error().is_some() {
            return Ok(());
        }
        let bytes = b.build().unwrap();
        let cmd_offset = read_u32_le(&bytes, 4 * 4).unwrap() as usize;
        let cmd_bytes = read_u32_le(&bytes, 5 * 4).unwrap();
        let cmd_count = read_u32_le(&bytes, 6 * 4).unwrap();

        let mut offset = cmd_offset;
        let mut seen = 0u32;
        let end = cmd_offset + cmd_bytes as usize;
        while offset < end {
            let size = read_u32_le(&bytes, offset + 4).unwrap();
            offset += align4(size) as usize;
            seen += 1;
        }
        prop_assert_eq!(offset, end);
        prop_assert_eq!(seen, cmd_count);
    }
}
