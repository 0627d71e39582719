use clap::{Parser, Subcommand};
use photo_trail::config::{self, Overrides, Progress, Settings};
use photo_trail::tools::{ExifTool, Jpegtran};
use photo_trail::{offset, output, pipeline, scan};
use std::io;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Source directories shared by every command that reads photos.
#[derive(clap::Args, Clone, Default)]
struct SourceArgs {
    /// Directories searched recursively for JPEG photos (and GPX logs)
    dirs: Vec<String>,
}

#[derive(clap::Args, Clone, Default)]
struct KmlArgs {
    #[command(flatten)]
    sources: SourceArgs,

    /// Output KML file (stdout when omitted)
    #[arg(short, long)]
    output: Option<String>,

    /// Additional GPX file; may be repeated
    #[arg(short, long)]
    gpx: Vec<String>,

    /// Base URL the photos are published under, used for caption links
    #[arg(short, long)]
    url: Option<String>,

    /// UTC offset the camera clock was set to, as (+|-)HHMM
    #[arg(short, long, allow_hyphen_values = true)]
    timezone: Option<String>,

    /// Document title
    #[arg(long)]
    title: Option<String>,

    /// Merge into an existing output file instead of refusing to overwrite it
    #[arg(long)]
    update: bool,

    /// With --update, replace tracks and photos that are already present
    #[arg(long)]
    replace: bool,
}

#[derive(clap::Args, Clone, Default)]
struct OffsetArgs {
    #[command(flatten)]
    sources: SourceArgs,

    /// A photo of a clock showing UTC; measures that one shot only
    #[arg(long, requires = "utc")]
    photo: Option<PathBuf>,

    /// The UTC time shown in --photo, e.g. 2024-06-01T14:03:00Z
    #[arg(long, requires = "photo")]
    utc: Option<String>,
}

#[derive(clap::Args, Clone, Default)]
struct GpxArgs {
    #[command(flatten)]
    sources: SourceArgs,

    /// Output GPX file (stdout when omitted)
    #[arg(short, long)]
    output: Option<String>,

    /// exiftool print format file to use instead of the built-in one
    #[arg(short, long)]
    format: Option<String>,
}

#[derive(Parser)]
#[command(name = "photo-trail")]
#[command(about = "Map geotagged JPEG photos and GPX logs into a KML document")]
#[command(long_about = "\
Map geotagged JPEG photos and GPX logs into a KML document

Every JPEG with a GPS fix becomes a placemark; the photos of each calendar
day are joined into a track. GPX files found next to the photos (or given
with --gpx) are added as recorded tracks, and photos taken while a recorded
track was running name it in their caption.

Document layout:

  Document
  ├── Style #picture, #color0 … #color5   # Camera icon, cycling line colours
  ├── Folder Tracks
  │   ├── 2024-06-01                      # One per day, photo order
  │   └── morning-ride                    # One per recorded GPX track
  └── Folder Images
      └── IMG_0001                        # Caption: image, date, time, track

Tags are read with exiftool; orient uses jpegtran. Settings come from
photo-trail.toml (or --config) and are overridden by command-line flags.

Run 'photo-trail gen-config' to print a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./photo-trail.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// How much to report on stderr
    #[arg(long, value_enum, global = true)]
    progress: Option<Progress>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(flatten)]
    Task(Task),
    /// Print a stock photo-trail.toml with all options documented
    GenConfig,
}

/// Commands that run against resolved settings.
#[derive(Subcommand)]
enum Task {
    /// Build a KML document from photos and GPX logs
    Kml(KmlArgs),
    /// Estimate the camera clock offset from GPS time
    Offset(OffsetArgs),
    /// Write a GPX log of the photo positions
    Gpx(GpxArgs),
    /// Rotate photos upright losslessly according to their EXIF orientation
    Orient(SourceArgs),
    /// Print every placeable photo as JSON
    Scan(SourceArgs),
}

impl Task {
    /// The command-line layer of the config.
    fn overrides(&self, progress: Option<Progress>) -> Overrides {
        let mut overrides = Overrides {
            progress,
            ..Overrides::default()
        };
        match self {
            Task::Kml(args) => {
                overrides.dirs = args.sources.dirs.clone();
                overrides.output = args.output.clone();
                overrides.gpx = args.gpx.clone();
                overrides.url = args.url.clone();
                overrides.timezone = args.timezone.clone();
                overrides.title = args.title.clone();
                overrides.update = args.update.then_some(true);
                overrides.replace = args.replace.then_some(true);
            }
            Task::Offset(args) => overrides.dirs = args.sources.dirs.clone(),
            Task::Gpx(args) => {
                overrides.dirs = args.sources.dirs.clone();
                overrides.output = args.output.clone();
                overrides.format = args.format.clone();
            }
            Task::Orient(args) | Task::Scan(args) => overrides.dirs = args.dirs.clone(),
        }
        overrides
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let task = match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        Command::Task(task) => task,
    };

    let path = config::config_path(cli.config.as_deref());
    let config = config::load_config(&path, &task.overrides(cli.progress))?;
    init_logging(config.arguments.progress);
    if cli.config.is_some() && !path.exists() {
        warn!(config = %path.display(), "config file not found, using defaults");
    }
    let settings = config.arguments.settings()?;

    match task {
        Task::Kml(_) => {
            let mut exiftool = ExifTool::start()?;
            let summary = pipeline::make_kml(&settings, &mut exiftool)?;
            output::print_build_output(&summary);
        }
        Task::Offset(args) => run_offset(&settings, args)?,
        Task::Gpx(_) => {
            let written = pipeline::make_gpx(&settings)?;
            output::print_gpx_output(written.as_deref());
        }
        Task::Orient(_) => {
            let mut exiftool = ExifTool::start()?;
            let summary = pipeline::orient_photos(&settings, &mut exiftool, &Jpegtran::new())?;
            output::print_orient_output(&summary);
            if !summary.failed.is_empty() {
                return Err(format!("{} photo(s) could not be re-oriented", summary.failed.len()).into());
            }
        }
        Task::Scan(_) => {
            let mut exiftool = ExifTool::start()?;
            let photos = pipeline::scan_photos(&settings, &mut exiftool)?;
            println!("{}", serde_json::to_string_pretty(&photos)?);
        }
    }

    Ok(())
}

fn run_offset(settings: &Settings, args: OffsetArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut exiftool = ExifTool::start()?;
    match (args.photo, args.utc) {
        (Some(photo), Some(utc)) => {
            let utc = offset::parse_utc_argument(&utc)?;
            let seconds = offset::single_offset(&mut exiftool, &photo, utc)?;
            output::print_single_offset(&photo, seconds);
        }
        _ => {
            let sources = scan::discover(&settings.dirs)?;
            let vote = offset::vote(&mut exiftool, &sources.photos)?;
            output::print_vote_output(&vote);
        }
    }
    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured progress level applies.
fn init_logging(progress: Progress) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(progress.filter_directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn gen_config_is_its_own_command() {
        let cli = Cli::try_parse_from(["photo-trail", "gen-config"]).unwrap();
        assert!(matches!(cli.command, Command::GenConfig));
    }

    #[test]
    fn replace_parses_without_update_flag() {
        let cli = Cli::try_parse_from(["photo-trail", "kml", "--replace", "photos"]).unwrap();
        let Command::Task(task) = cli.command else {
            panic!("expected a task command");
        };
        let overrides = task.overrides(None);
        assert_eq!(overrides.replace, Some(true));
        assert_eq!(overrides.update, None);
        assert_eq!(overrides.dirs, vec!["photos"]);
    }

    #[test]
    fn negative_timezone_is_a_value() {
        let cli = Cli::try_parse_from(["photo-trail", "kml", "--timezone", "-0800"]).unwrap();
        let Command::Task(task) = cli.command else {
            panic!("expected a task command");
        };
        assert_eq!(task.overrides(None).timezone.as_deref(), Some("-0800"));
    }
}
