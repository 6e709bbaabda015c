use tracing_subscriber::EnvFilter;

/// Dependencies that are chatty at `debug`.
const QUIET: &[&str] = &["hyper=info", "reqwest=info", "rustls=info", "winit=info", "eframe=info", "egui_glow=info"];

/// Installs the fmt subscriber at `info`, or `debug` when asked for. Only a
/// debug session lets `RUST_LOG` replace the filter. Calling this twice is a
/// no-op.
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| directives("debug"))
    } else {
        directives("info")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(debug)
        .try_init();
}

fn directives(level: &str) -> EnvFilter {
    let mut filter = level.to_string();
    if level == "debug" {
        for quiet in QUIET {
            filter.push(',');
            filter.push_str(quiet);
        }
    }
    EnvFilter::new(filter)
}

/// Shortens a URL for log lines; data URIs can run to megabytes.
pub fn short_url(url: &str) -> &str {
    const MAX: usize = 80;
    match url.char_indices().nth(MAX) {
        Some((idx, _)) => &url[..idx],
        None => url,
    }
}
