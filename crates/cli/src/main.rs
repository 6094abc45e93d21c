use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use passport_studio_core::{
    config::Config,
    crop::CropRect,
    export,
    gemini::GeminiService,
    image_processing::ImageProcessor,
    init,
    pipeline::Session,
    synthesis::SynthesisClient,
    ui::{self, CropFrame},
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the model defined in .env
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the desktop studio (default)
    Ui,

    /// Synthesize, crop and export one portrait without the UI
    Process {
        /// Portrait photo to send: a file path or a `data:image/...;base64,` URI
        input: String,

        /// Crop rectangle in result pixels: x,y,width,height
        #[arg(long, value_parser = parse_crop, conflicts_with = "zoom")]
        crop: Option<CropRect>,

        /// Centred crop at this zoom (1.0 - 3.0) when --crop is not given
        #[arg(long, default_value_t = 1.0)]
        zoom: f32,

        /// Directory to write the PNG into
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Crop and resample an existing image to the passport print size
    Resample {
        input: PathBuf,

        /// Crop rectangle in image pixels: x,y,width,height
        #[arg(long, value_parser = parse_crop)]
        crop: CropRect,

        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init();
    let args = Args::parse();
    init_tracing(args.verbose);

    // Load config and override model if specified via CLI
    let mut config = Config::load();
    if let Some(m) = args.model {
        config.model_name = m;
    }

    match args.command.unwrap_or(Command::Ui) {
        Command::Ui => ui::run_studio(config).context("Failed to run the studio")?,
        Command::Process {
            input,
            crop,
            zoom,
            out,
        } => process(config, input, crop, zoom, out).await?,
        Command::Resample { input, crop, out } => {
            let bytes = std::fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let png = ImageProcessor::resample(&bytes, crop).context("Failed to resample")?;
            let path = export::save_png(&out, &png, export::timestamp_now())?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs one portrait through the same session state machine the studio uses.
async fn process(
    config: Config,
    input: String,
    crop: Option<CropRect>,
    zoom: f32,
    out: PathBuf,
) -> Result<()> {
    let mut session = Session::new();
    if input.starts_with("data:") {
        session
            .load_data_uri(&input)
            .context("Input data URI is not a readable image")?;
    } else {
        let path = PathBuf::from(&input);
        let bytes =
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        session
            .load_file(bytes)
            .with_context(|| format!("{} is not a readable image", path.display()))?;
    }

    let prompt = config.prompt.clone();
    let service = GeminiService::new(config);
    info!(model = service.model_name(), "synthesizing");
    let client = SynthesisClient::new(service, prompt);

    let ticket = session
        .begin_synthesis()
        .context("Session refused to start synthesis")?;
    let outcome = client.synthesize(&ticket.image).await;
    session.complete_synthesis(ticket.token, outcome);
    if let Some(message) = session.error() {
        bail!("{}", message);
    }

    let result = session.result().context("Synthesis produced no result")?;
    let crop = match crop {
        Some(crop) => crop,
        None => {
            let (width, height) = ImageProcessor::dimensions(&result.bytes)
                .context("Synthesized image could not be decoded")?;
            let mut frame = CropFrame::new(width, height);
            frame.set_zoom(zoom);
            session.set_zoom(frame.zoom());
            frame.rect()
        }
    };
    session.report_crop(crop);

    let job = session.begin_export().context("Nothing to export")?;
    let png = ImageProcessor::resample(&job.image.bytes, job.crop).context("Export interrupted")?;
    let path = export::save_png(&out, &png, export::timestamp_now())?;
    println!("{}", path.display());
    Ok(())
}

fn parse_crop(value: &str) -> std::result::Result<CropRect, String> {
    let numbers = value
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in crop: {}", e))?;

    let &[x, y, width, height] = numbers.as_slice() else {
        return Err("crop must be x,y,width,height".to_string());
    };
    let crop = CropRect::new(x, y, width, height);
    if !crop.is_valid() {
        return Err("crop width and height must be positive".to_string());
    }
    Ok(crop)
}
