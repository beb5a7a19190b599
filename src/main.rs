use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueHint};

use em31view_lib::{
    commands::{self, AppState, SETTINGS_FILE_NAME},
    export::CSV_FILE_NAME,
    settings::SettingsStore,
    sync::{CanvasMap, DisabledTable},
    utils::logging,
    BackendClient,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "EM31 survey viewer (headless)", long_about = None)]
struct Cli {
    /// Directory holding settings and the drill-point database
    #[arg(long, global = true, default_value = ".em31view", value_hint = ValueHint::DirPath)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a survey file to the backend and export its readings as CSV
    Upload(UploadArgs),
    /// Check whether the backend answers its health endpoint
    Health,
    /// Print the URL of one map tile
    Tile { z: u32, x: u32, y: u32 },
}

#[derive(Parser, Debug)]
struct UploadArgs {
    /// Instrument file to upload
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    file: PathBuf,

    /// Instrument height in metres (comma or dot decimals); invalid input uses the default
    #[arg(long)]
    inst_height: Option<String>,

    /// Manual colour scale minimum (mS/m); requires --scale-max
    #[arg(long, requires = "scale_max")]
    scale_min: Option<String>,

    /// Manual colour scale maximum (mS/m); requires --scale-min
    #[arg(long, requires = "scale_min")]
    scale_max: Option<String>,

    /// Output CSV path
    #[arg(short, long, default_value = CSV_FILE_NAME, value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let settings = SettingsStore::new(cli.data_dir.join(SETTINGS_FILE_NAME));
    let client = BackendClient::new(settings.backend_url())?;

    match cli.command {
        Command::Health => {
            if client.health().await.unwrap_or(false) {
                println!("backend ready at {}", client.base_url());
            } else {
                bail!("backend at {} is not ready", client.base_url());
            }
        }
        Command::Tile { z, x, y } => {
            let template = settings.snapshot().tile_url_template;
            println!("{}", client.tile_url(&template, z, x, y));
        }
        Command::Upload(args) => {
            let snapshot = settings.snapshot();
            client
                .wait_until_ready(snapshot.health_timeout(), snapshot.health_retry())
                .await?;
            drop(settings);

            let state = AppState::open(
                &cli.data_dir,
                Box::new(DisabledTable),
                Box::new(CanvasMap::new(snapshot.canvas_width, snapshot.canvas_height)),
            )
            .await?;
            run_upload(&state, args).await?;
        }
    }

    Ok(())
}

async fn run_upload(state: &AppState, args: UploadArgs) -> Result<()> {
    let default_height = state.settings.default_instrument_height().meters().to_string();
    let raw_height = args.inst_height.unwrap_or(default_height);

    let report = commands::upload_survey(state, &args.file, &raw_height)
        .await
        .map_err(anyhow::Error::msg)?;
    if let Some(notice) = &report.notice {
        eprintln!("{notice}");
    }
    let Some(summary) = report.summary else {
        bail!("upload was superseded");
    };
    println!("{}", summary.file_info());
    for line in summary.describe() {
        println!("{line}");
    }
    println!(
        "{} readings, instrument height {} m",
        summary.readings, report.instrument_height
    );

    if let (Some(min), Some(max)) = (&args.scale_min, &args.scale_max) {
        let scale = commands::set_scale(state, min, max).map_err(anyhow::Error::msg)?;
        println!("colour scale {:.2} .. {:.2} mS/m", scale.min, scale.max);
    }

    if !state.sync.export_to_file(&args.output)? {
        bail!("no survey loaded after upload");
    }
    println!("wrote {}", args.output.display());
    Ok(())
}
