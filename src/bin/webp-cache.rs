use std::{
    fs::File,
    io::{BufReader, Write as _},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use webp_cache::{
    CacheConfig, DerivedCache, Encoder as _, ImageFormat, Quality, StillEncoderKind, ToolEncoder,
    ToolFlavor, Upload,
};

#[derive(Parser, Debug)]
#[command(name = "webp-cache", version, about = "WebP derivative cache for uploaded images")]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Root of the original store.
    #[arg(long, env = "WEBP_PICS_DIR", default_value = "./uploads/pics", global = true)]
    pics_dir: PathBuf,

    /// Root of the derivative store.
    #[arg(long, env = "WEBP_WEBP_DIR", default_value = "./uploads/webp", global = true)]
    webp_dir: PathBuf,

    /// Encoder quality; clamped to [1, 100].
    #[arg(long, env = "WEBP_QUALITY", default_value = "80", global = true)]
    quality: String,

    /// Still-image encoder program.
    #[arg(long, env = "WEBP_CWEBP", default_value = "cwebp", global = true)]
    cwebp: String,

    /// Animation encoder program.
    #[arg(long, env = "WEBP_GIF2WEBP", default_value = "gif2webp", global = true)]
    gif2webp: String,

    /// Which encoder handles still images.
    #[arg(long, env = "WEBP_STILL_ENCODER", value_enum, default_value_t = EncoderChoice::Cwebp, global = true)]
    still_encoder: EncoderChoice,

    /// Backfill missing derivatives in the background while the command runs.
    #[arg(long, env = "WEBP_CONVERT_EXISTING", global = true)]
    convert_existing: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store an image and convert it; prints the ingest report.
    Ingest(IngestArgs),
    /// Resolve a key the way the read path does.
    Get(GetArgs),
    /// Save the original or the derivative under its own file name.
    Download(DownloadArgs),
    /// List a directory of the derivative store.
    Ls {
        /// Sub-directory relative to the derivative root.
        dir: Option<String>,
    },
    /// Run one backfill pass in the foreground.
    Sweep,
    /// Report which encoders are available.
    Tools,
}

#[derive(Args, Debug)]
struct IngestArgs {
    file: PathBuf,

    /// Declared content type; guessed from the extension when omitted.
    #[arg(long)]
    content_type: Option<String>,
}

#[derive(Args, Debug)]
struct GetArgs {
    key: String,

    /// Write the content here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("which").required(true).args(["original", "webp"])))]
struct DownloadArgs {
    key: String,

    #[arg(long)]
    original: bool,

    #[arg(long)]
    webp: bool,

    /// Directory to save into.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EncoderChoice {
    Cwebp,
    Builtin,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = build_config(&cli.store);
    let cache = Arc::new(DerivedCache::from_config(&cfg).context("initialize stores")?);

    let backfill = if cli.store.convert_existing {
        Some(cache.spawn_sweep()?)
    } else {
        None
    };

    let result = run(&cache, &cfg, cli.cmd);

    if let Some(handle) = backfill {
        match handle.join() {
            Ok(stats) => tracing::info!(?stats, "background backfill joined"),
            Err(_) => tracing::error!("background backfill panicked"),
        }
    }
    result
}

fn run(cache: &DerivedCache, cfg: &CacheConfig, cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Ingest(args) => cmd_ingest(cache, args),
        Command::Get(args) => cmd_get(cache, args),
        Command::Download(args) => cmd_download(cache, args),
        Command::Ls { dir } => print_json(&cache.list(dir.as_deref())?),
        Command::Sweep => print_json(&cache.sweep()),
        Command::Tools => cmd_tools(cfg),
    }
}

fn build_config(args: &StoreArgs) -> CacheConfig {
    CacheConfig {
        pics_dir: args.pics_dir.clone(),
        webp_dir: args.webp_dir.clone(),
        quality: parse_quality(&args.quality),
        cwebp: args.cwebp.clone(),
        gif2webp: args.gif2webp.clone(),
        still_encoder: match args.still_encoder {
            EncoderChoice::Cwebp => StillEncoderKind::Cwebp,
            EncoderChoice::Builtin => StillEncoderKind::Builtin,
        },
    }
}

fn parse_quality(raw: &str) -> Quality {
    match raw.trim().parse::<i64>() {
        Ok(n) => {
            let q = Quality::clamped(n);
            if i64::from(q.get()) != n {
                tracing::warn!(requested = n, using = q.get(), "quality out of range, clamped");
            }
            q
        }
        Err(_) => {
            tracing::warn!(raw, using = Quality::DEFAULT.get(), "quality is not an integer");
            Quality::DEFAULT
        }
    }
}

fn cmd_ingest(cache: &DerivedCache, args: IngestArgs) -> anyhow::Result<()> {
    let content_type = args
        .content_type
        .unwrap_or_else(|| guess_content_type(&args.file).to_string());
    let file_name = args.file.file_name().and_then(|n| n.to_str());
    let f = File::open(&args.file).with_context(|| format!("open '{}'", args.file.display()))?;

    let report = cache.ingest(
        Upload {
            file_name,
            content_type: &content_type,
        },
        BufReader::new(f),
    )?;
    print_json(&report)
}

fn guess_content_type(path: &Path) -> &'static str {
    match ImageFormat::from_path(path) {
        ImageFormat::Unknown => "application/octet-stream",
        known => known.mime(),
    }
}

fn cmd_get(cache: &DerivedCache, args: GetArgs) -> anyhow::Result<()> {
    let resolved = cache.resolve(&args.key)?;
    match args.out {
        Some(out) => {
            std::fs::write(&out, &resolved.content)
                .with_context(|| format!("write '{}'", out.display()))?;
            print_json(&serde_json::json!({
                "content_type": resolved.content_type,
                "served": resolved.served,
                "bytes": resolved.content.len(),
                "out": out,
            }))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&resolved.content).context("write stdout")?;
            stdout.flush().context("flush stdout")
        }
    }
}

fn cmd_download(cache: &DerivedCache, args: DownloadArgs) -> anyhow::Result<()> {
    let download = if args.original {
        cache.fetch_original(&args.key)?
    } else {
        cache.fetch_derivative(&args.key)?
    };
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create '{}'", args.out_dir.display()))?;
    let out = args.out_dir.join(&download.file_name);
    std::fs::write(&out, &download.content).with_context(|| format!("write '{}'", out.display()))?;
    print_json(&serde_json::json!({
        "file_name": download.file_name,
        "content_type": download.content_type,
        "bytes": download.content.len(),
        "out": out,
    }))
}

fn cmd_tools(cfg: &CacheConfig) -> anyhow::Result<()> {
    let still = ToolEncoder::new(&cfg.cwebp, ToolFlavor::Still);
    let animated = ToolEncoder::new(&cfg.gif2webp, ToolFlavor::Animated);
    print_json(&serde_json::json!({
        "still_encoder": cfg.still_encoder,
        "quality": cfg.quality,
        "cwebp": { "program": still.program(), "available": still.is_available() },
        "gif2webp": { "program": animated.program(), "available": animated.is_available() },
    }))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{s}");
    Ok(())
}
