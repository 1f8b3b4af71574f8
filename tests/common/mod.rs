#![allow(dead_code)]

use std::fs::File;
use std::path::Path;

use mediarecode::media::{CodecDescriptor, Mp4Sink};
use mediarecode::mp4::stsd::{AudioFields, SampleEntry, VisualFields};
use mediarecode::mp4::{BoxNode, BoxType, FourCC, UnknownBox};
use mediarecode::{DestinationStream, SinkOptions, Slice, SliceType, TrackInfo, TrackKind};

pub const SECOND: u64 = 10_000_000;
pub const FRAME: u64 = 400_000;
pub const AUDIO_FRAME: u64 = 200_000;
pub const GOP: u64 = 25;

/// avcC record: High profile, level 3.1, one SPS and one PPS
fn avcc() -> Vec<u8> {
    vec![
        1, 0x64, 0x00, 0x1F, 0xFF, 0xE1, 0, 4, 0x67, 0x64, 0x00, 0x1F, 1, 0, 2, 0x68, 0xEE,
    ]
}

pub fn video_info() -> TrackInfo {
    TrackInfo {
        id: 1,
        codec: CodecDescriptor {
            kind: TrackKind::Video,
            entry: SampleEntry::visual(
                FourCC::new(b"avc1"),
                VisualFields::new(640, 360),
                vec![UnknownBox::new(BoxType::fourcc(b"avcC"), avcc())],
            ),
        },
        timescale: 90_000,
        duration: 0,
        language: "und".to_string(),
        handler_name: String::new(),
        width: 640,
        height: 360,
        volume: 0,
    }
}

pub fn audio_info() -> TrackInfo {
    TrackInfo {
        id: 2,
        codec: CodecDescriptor {
            kind: TrackKind::Audio,
            entry: SampleEntry::audio(FourCC::new(b"mp4a"), AudioFields::new(2, 48_000), vec![]),
        },
        timescale: 48_000,
        duration: 0,
        language: "eng".to_string(),
        handler_name: String::new(),
        width: 0,
        height: 0,
        volume: 0x0100,
    }
}

/// Frame `index` of a 25 fps stream with a key frame every second. With `b_frames`,
/// the two frames after each key frame are B-frames.
pub fn video_slice(index: u64, b_frames: bool) -> Slice {
    let slice_type = match index % GOP {
        0 => SliceType::KeyFrame,
        1 | 2 if b_frames => SliceType::BFrame,
        _ => SliceType::DeltaFrame,
    };
    Slice {
        index,
        offset: 0,
        length: if slice_type == SliceType::KeyFrame { 32 } else { 16 },
        duration: FRAME,
        timestamp: (slice_type != SliceType::BFrame).then_some(index * FRAME),
        composition: None,
        slice_type,
    }
}

pub fn audio_slice(index: u64) -> Slice {
    Slice {
        index,
        offset: 0,
        length: 8,
        duration: AUDIO_FRAME,
        timestamp: Some(index * AUDIO_FRAME),
        composition: None,
        slice_type: SliceType::Audio,
    }
}

fn payload(slice: &Slice) -> Vec<u8> {
    vec![slice.index as u8; slice.length as usize]
}

/// Write a flat MP4 of `seconds` length. Sample payloads repeat the low byte of the
/// sample index.
pub fn write_movie(path: &Path, seconds: u64, video: bool, audio: bool, b_frames: bool) {
    let file = File::create(path).unwrap();
    let mut sink = Mp4Sink::new(file, SinkOptions::default()).unwrap();
    let video_id = video.then(|| sink.add_track(&video_info()).unwrap());
    let audio_id = audio.then(|| sink.add_track(&audio_info()).unwrap());
    let frames = seconds * SECOND / FRAME;
    for index in 0..frames {
        if let Some(id) = video_id {
            let slice = video_slice(index, b_frames);
            sink.write_slice(id, &slice, &payload(&slice)).unwrap();
        }
        if let Some(id) = audio_id {
            for audio_index in [2 * index, 2 * index + 1] {
                let slice = audio_slice(audio_index);
                sink.write_slice(id, &slice, &payload(&slice)).unwrap();
            }
        }
    }
    sink.finalize().unwrap();
}

/// Depth-first search for a box by its four character code.
pub fn find_box<'a>(nodes: &'a [BoxNode], code: &[u8; 4]) -> Option<&'a BoxNode> {
    for node in nodes {
        if node.header.box_type.is(code) {
            return Some(node);
        }
        if let Some(found) = find_box(&node.children, code) {
            return Some(found);
        }
    }
    None
}

/// `trak` boxes of a box tree, in file order.
pub fn traks(nodes: &[BoxNode]) -> Vec<&BoxNode> {
    find_box(nodes, b"moov")
        .map(|moov| {
            moov.children
                .iter()
                .filter(|c| c.header.box_type.is(b"trak"))
                .collect()
        })
        .unwrap_or_default()
}
