mod common;

use common::{find_box, traks, write_movie, SECOND};
use mediarecode::{
    box_tree, open_source, recode_file, ClockRate, MediaRecodeError, MediaTrack, NoProgress,
    RecodeOptions, RecodeOutcome, Slice, SliceType, SourceStream, StreamFormat, TrackKind,
    TrackSelection,
};

fn slices(source: &dyn SourceStream, index: usize) -> Vec<Slice> {
    let mut cursor = source.tracks()[index].cursor();
    let mut slices = Vec::new();
    while let Some(slice) = cursor.advance() {
        slices.push(slice);
    }
    slices
}

#[test]
fn test_recode_mp4_to_mp4() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    write_movie(&input, 4, true, true, false);

    let options = RecodeOptions::new(SECOND, 25 * SECOND / 10);
    let summary = recode_file(&[&input], &output, &options, &mut NoProgress).unwrap();
    assert_eq!(summary.outcome, RecodeOutcome::Finalized);
    // key frame at 1 s through the key frame at 3 s
    assert_eq!(summary.tracks[0].samples, 51);
    assert_eq!(summary.tracks[1].samples, 101);

    let mut source = open_source(&output).unwrap();
    assert_eq!(source.format(), StreamFormat::Mp4);
    assert_eq!(source.tracks().len(), 2);
    assert_eq!(source.tracks()[0].sync_times(), vec![0, SECOND, 2 * SECOND]);

    let video = slices(source.as_ref(), 0);
    assert_eq!(video.len(), 51);
    assert_eq!(video[0].slice_type, SliceType::KeyFrame);
    assert_eq!(video[0].timestamp, Some(0));
    assert_eq!(source.read_slice(&video[0]).unwrap(), vec![25u8; 32]);
    assert_eq!(source.read_slice(&video[1]).unwrap(), vec![26u8; 16]);

    let audio = slices(source.as_ref(), 1);
    assert_eq!(audio.len(), 101);
    assert_eq!(audio[100].timestamp, Some(2 * SECOND));
    assert_eq!(source.read_slice(&audio[0]).unwrap(), vec![50u8; 8]);
}

#[test]
fn test_recode_mp4_to_smooth() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.ismv");
    write_movie(&input, 4, true, true, false);

    let options = RecodeOptions::new(SECOND, 25 * SECOND / 10);
    let summary = recode_file(&[&input], &output, &options, &mut NoProgress).unwrap();
    assert_eq!(summary.outcome, RecodeOutcome::Finalized);

    let mut source = open_source(&output).unwrap();
    assert_eq!(source.format(), StreamFormat::Smooth);
    assert!(source.is_fragmented());

    let video = slices(source.as_ref(), 0);
    assert_eq!(video.len(), 51);
    assert_eq!(video[0].slice_type, SliceType::KeyFrame);
    assert_eq!(video[25].slice_type, SliceType::KeyFrame);
    assert_eq!(video[25].timestamp, Some(SECOND));
    assert_eq!(source.read_slice(&video[0]).unwrap(), vec![25u8; 32]);

    let audio = slices(source.as_ref(), 1);
    assert_eq!(audio.len(), 101);
    assert_eq!(source.read_slice(&audio[1]).unwrap(), vec![51u8; 8]);

    let tree = box_tree(&output).unwrap();
    assert!(find_box(&tree, b"moof").is_some());
    assert!(find_box(&tree, b"mfra").is_some());
}

#[test]
fn test_window_past_the_end_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    write_movie(&input, 2, true, true, false);

    let options = RecodeOptions::new(10 * SECOND, 20 * SECOND);
    let summary = recode_file(&[&input], &output, &options, &mut NoProgress).unwrap();
    assert_eq!(summary.outcome, RecodeOutcome::EmptySelection);
    assert_eq!(summary.samples(), 0);
    assert!(!output.exists());
}

#[test]
fn test_invalid_window_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.mp4");
    write_movie(&input, 2, true, true, false);

    let options = RecodeOptions::new(0, SECOND / 2);
    let result = recode_file(&[&input], &output, &options, &mut NoProgress);
    assert!(matches!(result, Err(MediaRecodeError::Domain(_))));
    assert!(!output.exists());
}

#[test]
fn test_unknown_output_extension() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.avi");
    write_movie(&input, 2, true, false, false);

    let result = recode_file(&[&input], &output, &RecodeOptions::new(0, SECOND), &mut NoProgress);
    assert!(result.is_err());
    assert!(!output.exists());
}

#[test]
fn test_b_frames_get_composition_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    write_movie(&input, 3, true, true, true);

    let with_ctts = dir.path().join("ctts.mp4");
    let options = RecodeOptions::new(0, 15 * SECOND / 10).with_composition_offsets(true);
    let summary = recode_file(&[&input], &with_ctts, &options, &mut NoProgress).unwrap();
    // through the key frame at 2 s and the two B-frames after it
    assert_eq!(summary.tracks[0].samples, 53);

    let tree = box_tree(&with_ctts).unwrap();
    let tracks = traks(&tree);
    assert!(find_box(&tracks[0].children, b"ctts").is_some());
    assert!(find_box(&tracks[0].children, b"sdtp").is_some());
    assert!(find_box(&tracks[1].children, b"ctts").is_none());

    let source = open_source(&with_ctts).unwrap();
    let video = slices(source.as_ref(), 0);
    assert_eq!(video[1].slice_type, SliceType::BFrame);
    assert_eq!(video[1].timestamp, None);
    assert!(video[1].composition.is_some());

    let without_ctts = dir.path().join("plain.mp4");
    let options = RecodeOptions::new(0, 15 * SECOND / 10);
    recode_file(&[&input], &without_ctts, &options, &mut NoProgress).unwrap();
    let tree = box_tree(&without_ctts).unwrap();
    assert!(find_box(&tree, b"ctts").is_none());
    // B-frames stay marked as disposable
    assert!(find_box(&traks(&tree)[0].children, b"sdtp").is_some());
}

#[test]
fn test_composition_offsets_rejected_for_smooth_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.ismv");
    write_movie(&input, 2, true, true, true);

    let options = RecodeOptions::new(0, SECOND).with_composition_offsets(true);
    let result = recode_file(&[&input], &output, &options, &mut NoProgress);
    assert!(matches!(result, Err(MediaRecodeError::Domain(_))));
    assert!(!output.exists());
}

#[test]
fn test_tracks_from_two_files() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("video.mp4");
    let audio = dir.path().join("audio.m4a");
    let output = dir.path().join("out.mp4");
    write_movie(&video, 3, true, false, false);
    write_movie(&audio, 3, false, true, false);

    let options = RecodeOptions::new(0, SECOND).with_clock(ClockRate::HighFrameRate);
    let summary = recode_file(&[&video, &audio], &output, &options, &mut NoProgress).unwrap();
    assert_eq!(summary.tracks.len(), 2);
    assert_eq!(summary.tracks[0].source, 0);
    assert_eq!(summary.tracks[1].source, 1);

    let source = open_source(&output).unwrap();
    let tracks = source.tracks();
    assert_eq!(tracks[0].info().kind(), TrackKind::Video);
    assert_eq!(tracks[0].info().timescale, 120_000);
    assert_eq!(tracks[1].info().kind(), TrackKind::Audio);
    assert_eq!(tracks[1].info().timescale, 48_000);
}

#[test]
fn test_audio_only_selection() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mp4");
    let output = dir.path().join("out.m4a");
    write_movie(&input, 3, true, true, false);

    let options = RecodeOptions::new(SECOND, 2 * SECOND).with_selection(TrackSelection::AudioOnly);
    let summary = recode_file(&[&input], &output, &options, &mut NoProgress).unwrap();
    assert_eq!(summary.tracks.len(), 1);
    assert_eq!(summary.tracks[0].kind, TrackKind::Audio);

    let source = open_source(&output).unwrap();
    assert_eq!(source.tracks().len(), 1);
    assert_eq!(source.tracks()[0].info().id, 1);
}
