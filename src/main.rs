use clap::Parser;
use sheet2pdf::{
    pdf::FontSource, spawn_batch, BatchEvent, ContextError, ConversionConfiguration, PdfRenderer,
    ShapingCapability, TextShaper,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Creates one PDF report per entity of a spreadsheet", long_about = None)]
struct CliArguments {
    /// The spreadsheet (xlsx, xlsm, xlsb, xls, ods, csv or tsv) to convert.
    #[arg(value_name = "INPUT")]
    input_file_path: PathBuf,
    #[arg(short = 'c', long = "config", value_name = "json_file")]
    configuration_file_path: Option<PathBuf>,
    /// The column whose distinct values identify the entities.
    #[arg(short = 'k', long = "key-column", value_name = "column")]
    key_column: Option<String>,
    #[arg(short = 'o', long = "output", value_name = "directory")]
    output_directory: Option<PathBuf>,
    /// A TrueType font able to display the script of the source.
    #[arg(short = 'f', long = "font", value_name = "ttf_file")]
    font_file_path: Option<PathBuf>,
    #[arg(long = "no-shaping")]
    no_shaping: bool,
    /// Increases the verbosity of the logs, can be repeated.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbosity: u8,
}

impl CliArguments {
    /// Overrides the values of the configuration with the ones given on the command line.
    fn apply_to(&self, configuration: &mut ConversionConfiguration) {
        if let Some(key_column) = &self.key_column {
            configuration.key_column = key_column.clone();
        }
        if let Some(output_directory) = &self.output_directory {
            configuration.output_directory = output_directory.clone();
        }
        if let Some(font_file_path) = &self.font_file_path {
            configuration.font_file_path = Some(font_file_path.clone());
        }
        if self.no_shaping {
            configuration.enable_shaping = false;
        }
    }
}

fn main() {
    if let Err(error) = fallible_main() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}

fn fallible_main() -> Result<(), ContextError> {
    let arguments = CliArguments::parse();
    let level_filter = match arguments.verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level_filter.as_str())).init();
    log::debug!("{:?}", arguments);

    let mut configuration = match &arguments.configuration_file_path {
        Some(configuration_file_path) => ConversionConfiguration::from_path(configuration_file_path)?,
        None => ConversionConfiguration::default(),
    };
    arguments.apply_to(&mut configuration);
    log::debug!("{:?}", configuration);

    let shaping_capability = ShapingCapability::detect_if_enabled(configuration.enable_shaping);
    if configuration.enable_shaping && shaping_capability == ShapingCapability::Unavailable {
        log::warn!("Shaping has been requested but this build does not support it, the text will be written as is");
    }
    let font_source: Option<FontSource> = configuration.font_source();
    let renderer = PdfRenderer::new(font_source.as_ref(), TextShaper::new(shaping_capability))?;

    std::fs::create_dir_all(&configuration.output_directory).map_err(|error| {
        ContextError::with_error(
            format!("Failed to create the output directory {:?}", configuration.output_directory),
            &error,
        )
    })?;

    let (receiver, worker) = spawn_batch(
        arguments.input_file_path.clone(),
        configuration.key_column.clone(),
        configuration.output_directory.clone(),
        renderer,
    );

    let mut batch_result = None;
    for batch_event in receiver {
        match batch_event {
            BatchEvent::Progress(progress_event) => log::info!("{}", progress_event),
            BatchEvent::Finished(result) => batch_result = Some(result),
        }
    }
    worker
        .join()
        .map_err(|_| ContextError::with_context("The batch worker panicked"))?;

    let conversion_result = batch_result
        .ok_or_else(|| ContextError::with_context("The batch worker stopped without a result"))?
        .map_err(|error| ContextError::with_error("The conversion has been aborted", &error))?;

    println!("Success: {} PDFs created", conversion_result.success_count);
    if conversion_result.error_count > 0 {
        println!("Errors: {} PDFs failed", conversion_result.error_count);
        for failure in &conversion_result.failures {
            println!("  {}", failure);
        }
    }
    println!("Output directory: {}", conversion_result.output_directory.display());

    Ok(())
}
