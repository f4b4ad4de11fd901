/// ecg-digitize — replay a recorded event script over strip images and write
/// the calibrated CSV.

use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;

use ecg_digitizer::data::settings::Settings;
use ecg_digitizer::{OperatorEvent, Session, SourceImage};

#[derive(Parser)]
#[command(
    name = "ecg-digitize",
    version,
    about = "Replay an ECG digitizing script headlessly and export calibrated leads"
)]
struct Cli {
    /// Strip image(s), in navigation order
    #[arg(short, long, required = true)]
    image: Vec<PathBuf>,

    /// Replay script: JSON array of operator events
    #[arg(short, long)]
    script: PathBuf,

    /// Output CSV file (or - for stdout); defaults to the export filename
    #[arg(short, long)]
    out: Option<String>,

    /// Settings file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fit the normalized strip into this width (needs --target-height)
    #[arg(long, requires = "target_height")]
    target_width: Option<u32>,

    /// Fit the normalized strip into this height (needs --target-width)
    #[arg(long, requires = "target_width")]
    target_height: Option<u32>,

    /// Also write the session log as JSON
    #[arg(long)]
    log_json: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_json(path)?,
        None => Settings::default(),
    };
    if let (Some(w), Some(h)) = (cli.target_width, cli.target_height) {
        settings.target_size = Some((w, h));
    }

    let script = std::fs::read_to_string(&cli.script)?;
    let events: Vec<OperatorEvent> = serde_json::from_str(&script)?;
    log::info!("Replaying {} events from {}", events.len(), cli.script.display());

    let mut session = Session::new(settings);
    for path in &cli.image {
        session.add_image(SourceImage::open(path)?);
    }
    session.replay(&events)?;

    let csv = session.export_csv()?;
    let out = match cli.out {
        Some(out) => out,
        None => session.export_filename()?,
    };
    if out == "-" {
        io::stdout().lock().write_all(csv.as_bytes())?;
    } else {
        std::fs::write(&out, &csv)?;
        log::info!("Wrote {}", out);
    }

    if let Some(path) = &cli.log_json {
        session.log().save_json(path)?;
    }
    Ok(())
}
