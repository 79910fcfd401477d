use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use vidscrub::ScrubConfig;
use vidscrub::error::FetchError;
use vidscrub::host::PageLayout;
use vidscrub::sim::{FetchPlan, SimOptions, Simulation, Step};

const USAGE: &str = "usage: vidscrub [config.json] [--no-media] [--no-network] [--fetch-fails] \
[--seek-unsupported] [--metadata-never]";

struct Args {
    config: Option<PathBuf>,
    no_media: bool,
    no_network: bool,
    fetch_fails: bool,
    seek_unsupported: bool,
    metadata_never: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: None,
        no_media: false,
        no_network: false,
        fetch_fails: false,
        seek_unsupported: false,
        metadata_never: false,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--no-media" => args.no_media = true,
            "--no-network" => args.no_network = true,
            "--fetch-fails" => args.fetch_fails = true,
            "--seek-unsupported" => args.seek_unsupported = true,
            "--metadata-never" => args.metadata_never = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            flag if flag.starts_with("--") => anyhow::bail!("unknown flag '{flag}'\n{USAGE}"),
            path => args.config = Some(PathBuf::from(path)),
        }
    }
    Ok(args)
}

/// Long enough to see the fail-safe fire and the overlay fade finish.
fn run_length(config: &ScrubConfig) -> Duration {
    Duration::from_millis(config.failsafe_timeout_ms.saturating_add(2_000))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => ScrubConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ScrubConfig::default(),
    };

    let options = SimOptions {
        has_media: !args.no_media,
        has_network: !args.no_network,
        seek_supported: !args.seek_unsupported,
        fetch: if args.fetch_fails {
            FetchPlan::Fail(FetchError::Status(503))
        } else {
            FetchPlan::Succeed(vec![0; 1 << 16])
        },
        ..SimOptions::default()
    };

    let mut sim = Simulation::new(&options, config.clone());
    if !args.metadata_never {
        sim.at(Duration::from_millis(400), Step::LoadMetadata);
    }
    sim.at(Duration::from_millis(900), Step::Touch)
        .at(Duration::from_millis(2_500), Step::ScrollTo(1_500.0))
        .at(
            Duration::from_millis(3_000),
            Step::Resize(PageLayout {
                viewport_height: 640.0,
                ..PageLayout::default()
            }),
        )
        .at(Duration::from_millis(11_000), Step::ScrollTo(3_000.0));

    sim.run_until(run_length(&config));

    let page = &sim.page;
    log::info!("Overlay: {:?}", page.overlay_state());
    log::info!(
        "Dismissed at: {}",
        page.dismissed_at()
            .map_or_else(|| "never".to_string(), |t| format!("{}ms", t.as_millis()))
    );
    log::info!("Gate completion: {:?}", page.completion());
    log::info!("Readiness: {:?}", page.readiness());
    log::info!("Swap: {:?} ({:?})", page.swap_state(), page.swap_outcome());
    if let Some(binding) = page.binding() {
        log::info!(
            "Pin: start {:.0}, distance {:.0}, {} geometry recomputes",
            binding.pin_start,
            binding.pin_distance,
            page.geometry_recomputes()
        );
    }
    if let Some(media) = page.media_descriptor() {
        log::info!(
            "Media: {} ({:.2}s) at {:.2}s",
            media.original_source,
            media.duration,
            media.current_time
        );
    }
    Ok(())
}
