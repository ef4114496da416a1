//! CLI for SceneCraft - place a character next to a product with Gemini.

use clap::{Args, Parser, Subcommand, ValueEnum};
use scenecraft::status::{StatusTicker, DEFAULT_PERIOD};
use scenecraft::{
    EncodedImage, GeminiModel, GeminiProvider, SceneProvider, SelectedFile, Session, Uploader,
};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scenecraft")]
#[command(about = "Compose a character and a product into one scene via Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Model to use
    #[arg(short, long, value_enum, global = true, default_value = "flash-image-preview")]
    model: ModelArg,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a scene from a character image and a product image
    Compose(ComposeArgs),

    /// Print the data URL an image upload would produce
    Encode(EncodeArgs),

    /// Check that the API key and model are usable
    Check,
}

#[derive(Args)]
struct ComposeArgs {
    /// Character image (PNG, JPEG or WebP); sets style and aspect ratio
    #[arg(short, long)]
    character: PathBuf,

    /// Product image (PNG, JPEG or WebP)
    #[arg(short, long)]
    product: PathBuf,

    /// Directory the generated scene is saved into
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Args)]
struct EncodeArgs {
    /// Image file to encode
    path: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    FlashImagePreview,
    FlashImage,
}

impl From<ModelArg> for GeminiModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::FlashImagePreview => GeminiModel::FlashImagePreview,
            ModelArg::FlashImage => GeminiModel::FlashImage,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Nothing works without a key, so resolve it before any command runs.
    let provider = GeminiProvider::builder().model(cli.model.into()).build()?;

    match cli.command {
        Commands::Compose(args) => compose(provider, args, cli.json).await,
        Commands::Encode(args) => encode(args, cli.json).await,
        Commands::Check => check(provider, cli.json).await,
    }
}

/// Loads one upload slot and returns whatever the uploader reported.
async fn load_slot(path: PathBuf) -> anyhow::Result<Option<EncodedImage>> {
    let (tx, rx) = watch::channel(None);
    let mut uploader = Uploader::new();
    uploader.subscribe(move |image| {
        tx.send_replace(image);
    });

    let file = SelectedFile::from_path(path);
    if !file.is_image() {
        tracing::warn!(path = %file.path.display(), "not a PNG, JPEG or WebP image");
    }
    uploader.select(Some(file)).await?;

    let image = rx.borrow().clone();
    Ok(image)
}

async fn compose(
    provider: GeminiProvider,
    args: ComposeArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    let mut session = Session::new(provider);
    session.set_character(load_slot(args.character).await?);
    session.set_product(load_slot(args.product).await?);

    let status = (!json_output && session.can_generate()).then(|| {
        let ticker = StatusTicker::spawn(DEFAULT_PERIOD);
        let mut updates = ticker.subscribe();
        let mut loading = session.subscribe_loading();
        eprintln!("{}", ticker.current());
        let printer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let message = *updates.borrow_and_update();
                        eprintln!("{message}");
                    }
                    changed = loading.changed() => {
                        if changed.is_err() || !*loading.borrow_and_update() {
                            break;
                        }
                    }
                }
            }
        });
        (ticker, printer)
    });

    let generated = session.generate().await.is_some();
    if let Some((ticker, printer)) = status {
        ticker.stop();
        printer.await?;
    }

    if !generated {
        let message = session.error().unwrap_or("generation failed").to_string();
        if json_output {
            let result = serde_json::json!({
                "type": "scene",
                "success": false,
                "error": &message,
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        anyhow::bail!(message);
    }

    std::fs::create_dir_all(&args.out_dir)?;
    let path = session.download(&args.out_dir)?;
    let size = std::fs::metadata(&path)?.len();
    let format = session.result().and_then(|scene| scene.detected_format());

    if json_output {
        let result = serde_json::json!({
            "type": "scene",
            "success": true,
            "output": path.display().to_string(),
            "size_bytes": size,
            "format": format.map(|f| f.extension()),
            "provider": session.provider().kind().to_string(),
            "model": session.provider().model().as_str(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated scene: {} ({} bytes) via {}",
            path.display(),
            size,
            session.provider().name()
        );
    }

    Ok(())
}

async fn encode(args: EncodeArgs, json_output: bool) -> anyhow::Result<()> {
    let display = args.path.display().to_string();
    let Some(image) = load_slot(args.path).await? else {
        anyhow::bail!("{display} is not a PNG, JPEG or WebP image");
    };

    if json_output {
        let result = serde_json::json!({
            "type": "upload",
            "source": display,
            "mime_type": image.mime_type(),
            "data_url": image.to_data_url(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", image.to_data_url());
    }

    Ok(())
}

async fn check(provider: GeminiProvider, json_output: bool) -> anyhow::Result<()> {
    provider.health_check().await?;

    if json_output {
        let result = serde_json::json!({
            "provider": provider.kind().to_string(),
            "model": provider.model().as_str(),
            "healthy": true,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "{} is reachable ({})",
            provider.name(),
            provider.model().as_str()
        );
    }

    Ok(())
}
