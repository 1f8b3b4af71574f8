#[cfg(test)]
mod tests {
    use crate::media::slice::{CompositionOffset, Slice, SliceType};
    use crate::mp4::box_reader::BoxReader;
    use crate::mp4::box_writer::BoxWriter;
    use crate::mp4::ctts::{CttsBox, CttsEntry};
    use crate::mp4::r#box::Mp4Box;
    use crate::mp4::sdtp::SdtpBox;
    use crate::mp4::stco::ChunkOffsetBox;
    use crate::mp4::stsc::StscBox;
    use crate::mp4::stss::StssBox;
    use crate::mp4::stsz::StszBox;
    use crate::mp4::stts::SttsBox;
    use crate::mp4::table_builder::{BuiltTables, TableBuilder, TableOptions};
    use crate::scratch::ScratchConfig;
    use crate::time::to_scale;
    use proptest::prelude::*;
    use std::io::Cursor;

    const FRAME: u64 = 333_333;

    fn slice(index: u64, slice_type: SliceType, length: u32) -> Slice {
        Slice {
            index,
            offset: 0,
            length,
            duration: FRAME,
            timestamp: (slice_type != SliceType::BFrame).then_some(index * FRAME),
            composition: None,
            slice_type,
        }
    }

    fn write_tables(built: BuiltTables) -> Vec<u8> {
        let expected = built.size();
        let mut w = BoxWriter::new(Cursor::new(Vec::new())).unwrap();
        built.write(&mut w).unwrap();
        let bytes = w.into_inner().unwrap().into_inner();
        assert_eq!(bytes.len() as u64, expected);
        bytes
    }

    fn video_options() -> TableOptions {
        TableOptions {
            composition_offsets: true,
            dependencies: true,
        }
    }

    #[test]
    fn test_b_frame_composition_offsets() {
        let mut builder = TableBuilder::new(90_000, video_options(), &ScratchConfig::default());
        let types = [
            SliceType::KeyFrame,
            SliceType::BFrame,
            SliceType::BFrame,
            SliceType::DeltaFrame,
        ];
        for (i, t) in types.iter().enumerate() {
            builder.push(&slice(i as u64, *t, 100 + i as u32), 1000 + 100 * i as u64).unwrap();
        }
        assert_eq!(builder.native_duration(), 12_000);
        let built = builder.finish().unwrap();
        assert!(built.has_composition_offsets());
        assert!(built.has_dependencies());

        let bytes = write_tables(built);
        let mut r = BoxReader::new(Cursor::new(bytes)).unwrap();
        let stts = SttsBox::read_box(&mut r).unwrap();
        assert_eq!(stts.total_duration(), 12_000);
        let ctts = CttsBox::read_box(&mut r).unwrap();
        let offsets: Vec<i64> = ctts.entries.iter().map(|e| e.sample_offset).collect();
        assert_eq!(offsets, vec![0, 3000, 6000, 0]);
        assert!(ctts.entries.iter().all(|e| e.sample_count == 1));
        assert_eq!(StssBox::read_box(&mut r).unwrap().sample_numbers, vec![1]);
        assert_eq!(SdtpBox::read_box(&mut r).unwrap().flags, vec![0x20, 0x18, 0x18, 0x10]);
        assert_eq!(StscBox::read_box(&mut r).unwrap(), StscBox::one_sample_per_chunk(4));
        let stsz = StszBox::read_box(&mut r).unwrap();
        assert_eq!(stsz.entry_sizes, vec![100, 101, 102, 103]);
        let stco = ChunkOffsetBox::read_box(&mut r).unwrap();
        assert_eq!(stco.offsets, vec![1000, 1100, 1200, 1300]);
        assert!(!stco.large);
    }

    #[test]
    fn test_source_composition_offsets_are_kept() {
        let mut builder = TableBuilder::new(90_000, video_options(), &ScratchConfig::default());
        let mut first = slice(0, SliceType::KeyFrame, 10);
        first.composition = Some(CompositionOffset {
            reference: 2 * FRAME as i64,
            native: 6000,
        });
        builder.push(&first, 0).unwrap();
        let mut second = slice(1, SliceType::DeltaFrame, 10);
        second.composition = Some(CompositionOffset {
            reference: -(FRAME as i64),
            native: -3000,
        });
        builder.push(&second, 10).unwrap();

        let bytes = write_tables(builder.finish().unwrap());
        let mut r = BoxReader::new(Cursor::new(bytes)).unwrap();
        SttsBox::read_box(&mut r).unwrap();
        let ctts = CttsBox::read_box(&mut r).unwrap();
        assert_eq!(ctts.version, 1);
        assert_eq!(
            ctts.entries,
            vec![
                CttsEntry {
                    sample_count: 1,
                    sample_offset: 6000
                },
                CttsEntry {
                    sample_count: 1,
                    sample_offset: -3000
                },
            ]
        );
    }

    #[test]
    fn test_audio_tables_collapse() {
        let options = TableOptions {
            composition_offsets: true,
            dependencies: false,
        };
        let mut builder = TableBuilder::new(48_000, options, &ScratchConfig::default());
        for i in 0..10 {
            let mut s = slice(i, SliceType::Audio, 371);
            s.duration = 213_333;
            builder.push(&s, 4000 + 371 * i).unwrap();
        }
        let built = builder.finish().unwrap();
        assert!(!built.has_composition_offsets());
        assert!(!built.has_sync_table());

        let bytes = write_tables(built);
        let mut r = BoxReader::new(Cursor::new(bytes)).unwrap();
        let stts = SttsBox::read_box(&mut r).unwrap();
        assert_eq!(stts.sample_count(), 10);
        assert_eq!(stts.total_duration(), to_scale(48_000, 2_133_330));
        assert!(r.peek().unwrap().box_type.is(b"stsc"));
        StscBox::read_box(&mut r).unwrap();
        let stsz = StszBox::read_box(&mut r).unwrap();
        assert_eq!((stsz.sample_size, stsz.sample_count), (371, 10));
        assert!(stsz.entry_sizes.is_empty());
    }

    #[test]
    fn test_large_offsets_switch_to_co64() {
        let mut builder =
            TableBuilder::new(90_000, TableOptions::default(), &ScratchConfig::default());
        builder.push(&slice(0, SliceType::KeyFrame, 10), 100).unwrap();
        builder
            .push(&slice(1, SliceType::KeyFrame, 10), 5_000_000_000)
            .unwrap();
        let bytes = write_tables(builder.finish().unwrap());
        let mut r = BoxReader::new(Cursor::new(bytes)).unwrap();
        SttsBox::read_box(&mut r).unwrap();
        StscBox::read_box(&mut r).unwrap();
        StszBox::read_box(&mut r).unwrap();
        let co64 = ChunkOffsetBox::read_box(&mut r).unwrap();
        assert!(co64.large);
        assert_eq!(co64.offsets, vec![100, 5_000_000_000]);
    }

    #[test]
    fn test_empty_track_tables() {
        let builder = TableBuilder::new(90_000, video_options(), &ScratchConfig::default());
        let bytes = write_tables(builder.finish().unwrap());
        let mut r = BoxReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(SttsBox::read_box(&mut r).unwrap().entries.len(), 0);
        assert_eq!(StscBox::read_box(&mut r).unwrap().entries.len(), 0);
    }

    fn build(config: &ScratchConfig, count: u64) -> Vec<u8> {
        let mut builder = TableBuilder::new(90_000, video_options(), config);
        for i in 0..count {
            let t = match i % 4 {
                0 => SliceType::KeyFrame,
                1 | 2 => SliceType::BFrame,
                _ => SliceType::DeltaFrame,
            };
            builder.push(&slice(i, t, (i % 7) as u32 + 50), i * 64).unwrap();
        }
        write_tables(builder.finish().unwrap())
    }

    #[test]
    fn test_spilled_tables_match_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let spilling = ScratchConfig::default()
            .with_spill_threshold(16)
            .with_directory(dir.path());
        assert_eq!(build(&spilling, 500), build(&ScratchConfig::default(), 500));
    }

    proptest! {
        #[test]
        fn prop_duration_runs_sum_to_total(durations in prop::collection::vec(1u64..2_000_000, 1..200)) {
            let mut builder = TableBuilder::new(90_000, TableOptions::default(), &ScratchConfig::default());
            for (i, d) in durations.iter().enumerate() {
                let mut s = slice(i as u64, SliceType::KeyFrame, 1);
                s.duration = *d;
                builder.push(&s, i as u64).unwrap();
            }
            let total: u64 = durations.iter().sum();
            let bytes = write_tables(builder.finish().unwrap());
            let mut r = BoxReader::new(Cursor::new(bytes)).unwrap();
            let stts = SttsBox::read_box(&mut r).unwrap();
            prop_assert_eq!(stts.sample_count(), durations.len() as u64);
            prop_assert_eq!(stts.total_duration(), to_scale(90_000, total));
        }
    }
}
