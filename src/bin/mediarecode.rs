use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use mediarecode::{
    box_tree, describe_file, recode_file, ClockRate, LogProgress, MediaRecodeResult,
    RecodeOptions, RecodeOutcome, TrackSelection, DEFAULT_MIN_WINDOW, REFERENCE_TIMESCALE,
};

/// Describe MP4 and Smooth Streaming files, or cut a window out of them on key frames
///
/// With only SOURCE, prints a summary of its tracks. With START END DEST, copies the
/// window [START, END] (100 ns units) into DEST; the output format follows the extension
/// of DEST (.mp4 / .m4v / .m4a / .mov or .ismv / .isma / .piff).
#[derive(Parser)]
#[command(name = "mediarecode")]
#[command(version, about, long_about)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Input file
    source: PathBuf,

    /// Window start, 100 ns units
    #[arg(requires_all = ["end", "dest"])]
    start: Option<u64>,

    /// Window end, 100 ns units
    end: Option<u64>,

    /// Output file
    dest: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Print the box tree instead of the summary
    #[arg(long, conflicts_with = "json")]
    boxes: bool,

    /// Additional input whose tracks join the recode
    #[arg(long = "with", value_name = "SOURCE")]
    extra_sources: Vec<PathBuf>,

    /// Video track that drives the cut
    #[arg(long)]
    track: Option<u32>,

    /// Copy audio tracks only
    #[arg(long, conflicts_with = "video_only")]
    audio_only: bool,

    /// Copy video tracks only
    #[arg(long)]
    video_only: bool,

    /// Write composition offsets (MP4 output only)
    #[arg(long)]
    ctts: bool,

    /// Retime video tracks to this clock, in Hz (90000 or 120000)
    #[arg(long)]
    clock: Option<u32>,

    /// Shortest accepted window, 100 ns units
    #[arg(long, default_value_t = DEFAULT_MIN_WINDOW)]
    min_window: u64,
}

impl Cli {
    fn recode_options(&self, start: u64, end: u64) -> MediaRecodeResult<RecodeOptions> {
        let selection = if self.audio_only {
            TrackSelection::AudioOnly
        } else if self.video_only {
            TrackSelection::VideoOnly
        } else {
            TrackSelection::All
        };
        let mut options = RecodeOptions::new(start, end)
            .with_selection(selection)
            .with_composition_offsets(self.ctts)
            .with_min_window(self.min_window);
        if let Some(track) = self.track {
            options = options.with_video_track(track);
        }
        if let Some(hz) = self.clock {
            options = options.with_clock(ClockRate::try_from(hz)?);
        }
        Ok(options)
    }
}

fn run(cli: &Cli) -> MediaRecodeResult<()> {
    let (start, end, dest) = match (cli.start, cli.end, &cli.dest) {
        (Some(start), Some(end), Some(dest)) => (start, end, dest),
        _ => {
            if cli.boxes {
                for node in box_tree(&cli.source)? {
                    print!("{}", node);
                }
            } else {
                let summary = describe_file(&cli.source)?;
                if cli.json {
                    let json = serde_json::to_string_pretty(&summary)
                        .map_err(std::io::Error::from)?;
                    println!("{}", json);
                } else {
                    print!("{}", summary);
                }
            }
            return Ok(());
        }
    };

    let options = cli.recode_options(start, end)?;
    let mut sources = vec![cli.source.clone()];
    sources.extend(cli.extra_sources.iter().cloned());
    let summary = recode_file(&sources, dest, &options, &mut LogProgress::new())?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(std::io::Error::from)?;
        println!("{}", json);
        return Ok(());
    }
    match summary.outcome {
        RecodeOutcome::Finalized => {
            for track in &summary.tracks {
                println!(
                    "Track {} ({}) -> {}: {} samples, {:.3} s",
                    track.source_track,
                    track.kind,
                    track.destination_track,
                    track.samples,
                    track.duration as f64 / REFERENCE_TIMESCALE as f64
                );
            }
            println!("Wrote {}", dest.display());
        }
        RecodeOutcome::EmptySelection => {
            println!("The window selects no samples; nothing was written");
        }
        RecodeOutcome::Cancelled => println!("Cancelled"),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
