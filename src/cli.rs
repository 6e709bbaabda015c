// Headless mode: compose the three slots from files or URLs and write the PNG
// without opening a window.
//
//   ThumbnailComposer --left cover.jpg --middle https://example.com/shot.png \
//                     --right art.webp --output thumb.png

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use crate::compositor::Compositor;
use crate::config::{DEFAULT_SETTINGS_PATH, Settings};
use crate::drop;
use crate::error::LoadError;
use crate::geometry::SLOT_COUNT;
use crate::loader::ImageLoader;
use crate::selection::{Selection, truncate_name};
use crate::slot::SlotStatus;
use crate::source::{self, Fetch, HttpFetcher};
use crate::text;

/// Three-panel thumbnail composer.
///
/// Starts the editor unless --output is given, in which case the slots are
/// filled from the given sources and the composite is written straight to disk.
#[derive(Parser, Debug, Default)]
#[command(name = "ThumbnailComposer", version, about = "Compose three images into a slanted thumbnail")]
pub struct CliArgs {
    /// Image file or http(s)/data URL for the left panel.
    #[arg(long, value_name = "PATH|URL")]
    pub left: Option<String>,

    /// Image file or URL for the middle panel.
    #[arg(long, value_name = "PATH|URL")]
    pub middle: Option<String>,

    /// Image file or URL for the right panel.
    #[arg(long, value_name = "PATH|URL")]
    pub right: Option<String>,

    /// Write the composite here and exit instead of opening the editor.
    #[arg(short, long, value_name = "FILE.png")]
    pub output: Option<PathBuf>,

    /// How long to wait for all images to load.
    #[arg(long, default_value_t = 60, value_name = "SECS")]
    pub timeout_secs: u64,

    /// Settings file.
    #[arg(long, default_value = DEFAULT_SETTINGS_PATH, value_name = "FILE")]
    pub settings: PathBuf,

    /// Log at debug level; RUST_LOG may then narrow or widen the filter.
    #[arg(short, long)]
    pub debug: bool,
}

impl CliArgs {
    pub fn is_headless(&self) -> bool {
        self.output.is_some()
    }

    pub fn sources(&self) -> [Option<&str>; SLOT_COUNT] {
        [
            self.left.as_deref(),
            self.middle.as_deref(),
            self.right.as_deref(),
        ]
    }
}

/// Turns a command-line source into a local selection for `slot`. URLs are
/// taken as-is; anything else is read from disk and embedded.
pub fn selection_from_source(slot: usize, source: &str) -> Result<Selection, LoadError> {
    if drop::has_usable_scheme(source) {
        let name = drop::url_file_name(source);
        return Ok(Selection::dropped_url(slot, source, name.as_deref()));
    }
    let path = Path::new(source);
    let data_uri = source::read_file_as_data_uri(path)?;
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
    Ok(Selection::local_upload(slot, name.as_deref(), data_uri))
}

/// Runs the headless export and returns the process exit code. A slot whose
/// image cannot be loaded is drawn as an error placeholder and does not fail
/// the run; only a failed write does.
pub fn run(args: &CliArgs, settings: &Settings) -> ExitCode {
    let Some(output) = args.output.as_deref() else {
        eprintln!("error: --output is required in headless mode");
        return ExitCode::FAILURE;
    };
    let fetcher: Arc<dyn Fetch> = match HttpFetcher::new(Duration::from_secs(settings.request_timeout_secs)) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(err) => {
            eprintln!("error: could not set up HTTP client: {err}");
            return ExitCode::FAILURE;
        }
    };
    compose(args, settings, fetcher, output)
}

pub(crate) fn compose(args: &CliArgs, settings: &Settings, fetcher: Arc<dyn Fetch>, output: &Path) -> ExitCode {
    let started = Instant::now();
    let mut loader = ImageLoader::new(fetcher);

    for (slot, source) in args.sources().into_iter().enumerate() {
        let Some(source) = source else {
            continue;
        };
        match selection_from_source(slot, source) {
            Ok(selection) => {
                loader.reconcile(slot, Some(&selection));
            }
            Err(err) => {
                tracing::error!("slot {slot}: {err}");
                eprintln!("warning: slot {}: {err}", slot + 1);
                let name = Path::new(source)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| source.to_string());
                loader.request(slot, -(slot as i64) - 1, &truncate_name(&name), None);
            }
        }
    }

    if !loader.wait_idle(Duration::from_secs(args.timeout_secs)) {
        eprintln!(
            "warning: {} image(s) still loading after {}s",
            loader.pending(),
            args.timeout_secs
        );
    }

    for (index, slot) in loader.slots().iter().enumerate() {
        let status = match (slot.status(), slot.natural_size()) {
            (SlotStatus::Ready, Some(size)) => format!("ready ({}x{})", size.x, size.y),
            (SlotStatus::Failed, _) => "failed".to_string(),
            (SlotStatus::Loading, _) => "timed out".to_string(),
            _ => "empty".to_string(),
        };
        println!(
            "slot {}: {status}{}",
            index + 1,
            slot.display_name().map(|n| format!(" - {n}")).unwrap_or_default()
        );
    }

    let compositor = Compositor::new(
        settings.canvas_width,
        settings.canvas_height,
        text::load_font(settings.font_path.as_deref()),
    );
    match compositor.export_png(loader.slots(), output) {
        Ok(()) => {
            println!(
                "wrote {} in {:.1}s",
                output.display(),
                started.elapsed().as_secs_f32()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
