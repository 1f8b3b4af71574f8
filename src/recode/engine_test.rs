#[cfg(test)]
mod tests {
    use crate::errors::{MediaRecodeError, MediaRecodeResult};
    use crate::media::{SliceType, SourceStream, StreamFormat, TrackKind};
    use crate::recode::engine::{recode, RecodeOutcome, RecodeSummary};
    use crate::recode::fixtures::{
        audio_info, audio_slices, data_info, video_info, video_slices, MemorySource,
        MemoryTrack, RecordingDestination,
    };
    use crate::recode::options::{RecodeOptions, TrackSelection};
    use crate::recode::progress::{MockProgressSink, NoProgress};
    use crate::time::ClockRate;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};

    const SECOND: u64 = 10_000_000;

    /// 10 s of 25 fps video with a key frame every second, and 10 s of 50 Hz audio.
    fn movie() -> MemorySource {
        MemorySource::new(vec![
            MemoryTrack::new(video_info(1), video_slices(250, 25)),
            MemoryTrack::new(audio_info(2), audio_slices(500)),
        ])
    }

    fn run(
        source: &mut MemorySource,
        destination: &mut RecordingDestination,
        options: &RecodeOptions,
    ) -> MediaRecodeResult<RecodeSummary> {
        recode(
            &mut [source as &mut dyn SourceStream],
            destination,
            options,
            &mut NoProgress,
        )
    }

    #[test]
    fn test_window_is_cut_on_key_frames() {
        let mut source = movie();
        let mut destination = RecordingDestination::new(StreamFormat::Mp4);
        let options = RecodeOptions::new(2 * SECOND, 5 * SECOND);
        let summary = run(&mut source, &mut destination, &options).unwrap();

        assert_eq!(summary.outcome, RecodeOutcome::Finalized);
        assert!(destination.finalized);
        assert_eq!(destination.tracks.len(), 2);

        let video = destination.writes_for(1);
        // key frame at 2 s through the key frame at 6 s and its two B-frames
        assert_eq!(video.len(), 103);
        assert_eq!(video[0].index, 0);
        assert_eq!(video[0].timestamp, Some(0));
        assert_eq!(video[0].slice_type, SliceType::KeyFrame);
        assert_eq!(video[100].timestamp, Some(4 * SECOND));
        assert_eq!(video[102].slice_type, SliceType::BFrame);
        assert_eq!(video[102].timestamp, None);

        let audio = destination.writes_for(2);
        assert_eq!(audio.len(), 201);
        assert_eq!(audio[0].timestamp, Some(0));
        assert_eq!(audio[200].timestamp, Some(4 * SECOND));

        // payloads come from the original sample positions
        assert_eq!(destination.writes[0].2, vec![50u8; 16]);
        assert_eq!(source.reads, 304);

        assert_eq!(summary.tracks[0].kind, TrackKind::Video);
        assert_eq!(summary.tracks[0].samples, 103);
        assert_eq!(summary.tracks[0].duration, 103 * 400_000);
        assert_eq!(summary.tracks[1].samples, 201);
        assert_eq!(summary.samples(), 304);
    }

    #[test]
    fn test_progress_is_reported_per_sync_point() {
        let mut source = movie();
        let mut destination = RecordingDestination::new(StreamFormat::Mp4);
        let options = RecodeOptions::new(2 * SECOND, 5 * SECOND);
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reported);
        let mut progress = MockProgressSink::new();
        progress
            .expect_report()
            .times(8)
            .returning(move |f| sink.lock().unwrap().push(f));

        recode(
            &mut [&mut source as &mut dyn SourceStream],
            &mut destination,
            &options,
            &mut progress,
        )
        .unwrap();

        let reported = reported.lock().unwrap().clone();
        assert_eq!(&reported[..3], &[0.0, 0.0, 0.0]);
        assert!((reported[3] - 1.0 / 3.0).abs() < 1e-9);
        assert!((reported[4] - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(&reported[5..], &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_audio_only_uses_audio_sync_points() {
        let mut source = movie();
        let mut destination = RecordingDestination::new(StreamFormat::Mp4);
        let options = RecodeOptions::new(2 * SECOND, 3 * SECOND)
            .with_selection(TrackSelection::AudioOnly)
            .with_clock(ClockRate::Mpeg);
        let summary = run(&mut source, &mut destination, &options).unwrap();

        assert_eq!(summary.tracks.len(), 1);
        assert_eq!(summary.tracks[0].kind, TrackKind::Audio);
        assert_eq!(summary.tracks[0].samples, 52);
        assert!(destination.clocks.is_empty());
        assert_eq!(destination.writes[0].2, vec![100u8; 8]);
    }

    #[test]
    fn test_video_only_and_clock_override() {
        let mut source = movie();
        let mut destination = RecordingDestination::new(StreamFormat::Smooth);
        let options = RecodeOptions::new(0, 2 * SECOND)
            .with_selection(TrackSelection::VideoOnly)
            .with_clock(ClockRate::HighFrameRate);
        let summary = run(&mut source, &mut destination, &options).unwrap();

        assert_eq!(summary.tracks.len(), 1);
        assert_eq!(destination.clocks, vec![(1, ClockRate::HighFrameRate)]);
        // from the first frame through the key frame at 3 s and its B-frames
        assert_eq!(summary.tracks[0].samples, 78);
    }

    #[test]
    fn test_window_past_the_end_selects_nothing() {
        let mut source = movie();
        let mut destination = RecordingDestination::new(StreamFormat::Mp4);
        let options = RecodeOptions::new(20 * SECOND, 30 * SECOND);
        let mut progress = MockProgressSink::new();
        progress
            .expect_report()
            .withf(|f| *f == 0.0)
            .times(12)
            .returning(|_| ());

        let summary = recode(
            &mut [&mut source as &mut dyn SourceStream],
            &mut destination,
            &options,
            &mut progress,
        )
        .unwrap();

        assert_eq!(summary.outcome, RecodeOutcome::EmptySelection);
        assert!(!destination.finalized);
        assert!(destination.writes.is_empty());
        assert_eq!(source.reads, 0);
    }

    #[test]
    fn test_cancelled_run_is_not_finalized() {
        let mut source = movie();
        let mut destination = RecordingDestination::new(StreamFormat::Mp4);
        let options = RecodeOptions::new(0, 5 * SECOND)
            .with_cancel_flag(Arc::new(AtomicBool::new(true)));
        let mut progress = MockProgressSink::new();
        progress.expect_report().never();

        let summary = recode(
            &mut [&mut source as &mut dyn SourceStream],
            &mut destination,
            &options,
            &mut progress,
        )
        .unwrap();

        assert_eq!(summary.outcome, RecodeOutcome::Cancelled);
        assert!(!destination.finalized);
        assert!(destination.writes.is_empty());
    }

    #[test]
    fn test_explicit_video_track() {
        let mut source = MemorySource::new(vec![
            MemoryTrack::new(video_info(1), video_slices(100, 25)),
            MemoryTrack::new(video_info(3), video_slices(100, 50)),
            MemoryTrack::new(data_info(4), audio_slices(10)),
        ]);
        let mut destination = RecordingDestination::new(StreamFormat::Mp4);
        let options = RecodeOptions::new(SECOND, 2 * SECOND).with_video_track(3);
        let summary = run(&mut source, &mut destination, &options).unwrap();

        // track 3 has key frames every 2 s, so the cut starts at 2 s
        assert_eq!(summary.tracks.len(), 1);
        assert_eq!(summary.tracks[0].source_track, 3);
        assert_eq!(destination.writes_for(1)[0].index, 0);
        assert_eq!(destination.writes[0].2, vec![50u8; 16]);
    }

    #[test]
    fn test_invalid_requests_are_domain_errors() {
        let cases = vec![
            RecodeOptions::new(0, SECOND / 2),
            RecodeOptions::new(0, SECOND).with_video_track(2),
            RecodeOptions::new(0, SECOND).with_video_track(9),
            RecodeOptions::new(0, SECOND)
                .with_video_track(1)
                .with_selection(TrackSelection::AudioOnly),
        ];
        for options in cases {
            let mut source = movie();
            let mut destination = RecordingDestination::new(StreamFormat::Mp4);
            let result = run(&mut source, &mut destination, &options);
            assert!(matches!(result, Err(MediaRecodeError::Domain(_))));
            assert!(destination.tracks.is_empty());
        }
    }

    #[test]
    fn test_composition_offsets_need_mp4_output() {
        let mut source = movie();
        let mut destination = RecordingDestination::new(StreamFormat::Smooth);
        let options = RecodeOptions::new(0, SECOND).with_composition_offsets(true);
        let result = run(&mut source, &mut destination, &options);
        assert!(matches!(result, Err(MediaRecodeError::Domain(_))));
        assert!(destination.tracks.is_empty());

        let mut destination = RecordingDestination::new(StreamFormat::Mp4);
        run(&mut source, &mut destination, &options).unwrap();
        assert!(destination.composition_offsets);
    }

    #[test]
    fn test_only_data_tracks_is_a_domain_error() {
        let mut source = MemorySource::new(vec![MemoryTrack::new(data_info(1), audio_slices(100))]);
        let mut destination = RecordingDestination::new(StreamFormat::Mp4);
        let result = run(&mut source, &mut destination, &RecodeOptions::new(0, SECOND));
        assert!(matches!(result, Err(MediaRecodeError::Domain(_))));
    }

    #[test]
    fn test_tracks_from_several_sources() {
        let mut video = MemorySource::new(vec![MemoryTrack::new(
            video_info(1),
            video_slices(100, 25),
        )]);
        let mut audio = MemorySource::new(vec![MemoryTrack::new(audio_info(1), audio_slices(200))]);
        let mut destination = RecordingDestination::new(StreamFormat::Mp4);
        let options = RecodeOptions::new(0, SECOND);
        let summary = recode(
            &mut [
                &mut video as &mut dyn SourceStream,
                &mut audio as &mut dyn SourceStream,
            ],
            &mut destination,
            &options,
            &mut NoProgress,
        )
        .unwrap();

        assert_eq!(summary.tracks.len(), 2);
        assert_eq!(summary.tracks[0].source, 0);
        assert_eq!(summary.tracks[1].source, 1);
        assert_eq!(summary.tracks[1].destination_track, 2);
        // cut ends at the key frame at 2 s and its B-frames
        assert_eq!(summary.tracks[0].samples, 53);
        assert_eq!(summary.tracks[1].samples, 101);
        assert!(video.reads > 0 && audio.reads > 0);
    }
}
