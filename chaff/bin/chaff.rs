use std::process::ExitCode;

use chaff::{
    cli::{AnsiStyles, ChaffArgs, OutputFormat},
    config::{DEFAULT_LOG_FILTER, VERBOSE_LOG_FILTER},
    oci::{self, AnalyzeOptions, ImageAnalysis, Reference},
    render::{self, RenderOptions},
    ChaffError, ChaffResult,
};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let args = ChaffArgs::parse();

    // `--verbose` wins over RUST_LOG
    let filter = if args.verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    fmt()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    match run(args).await {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {e}", "error:".error());
            ExitCode::FAILURE
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

async fn run(args: ChaffArgs) -> ChaffResult<String> {
    let analysis = analyze(&args).await?;

    match args.output {
        OutputFormat::Text => {
            let options = RenderOptions::builder()
                .top(args.top)
                .layers(args.layers)
                .build();
            Ok(render::render_text(&analysis, &options))
        }
        OutputFormat::Json => {
            let mut json = render::render_json(&analysis)?;
            json.push('\n');
            Ok(json)
        }
    }
}

async fn analyze(args: &ChaffArgs) -> ChaffResult<ImageAnalysis> {
    if !args.archive.is_empty() {
        tracing::trace!("analyzing archives: {:?}", args.archive);
        return oci::analyze_archives(args.archive.as_slice()).await;
    }

    let image = args
        .image
        .as_deref()
        .ok_or_else(|| ChaffError::InvalidArgument("no image or archive given".into()))?;
    let reference: Reference = image.parse()?;

    let options = match &args.platform {
        Some(platform) => AnalyzeOptions::builder()
            .platform(oci::parse_platform(platform)?)
            .build(),
        None => AnalyzeOptions::builder().build(),
    };

    tracing::trace!("analyzing image: reference={reference}, options={options:?}");
    oci::analyze_remote(&reference, &options).await
}
