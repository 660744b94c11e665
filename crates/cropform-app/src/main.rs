//! Command-line shell that drives one form page headlessly.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use cropform_app::{
    AppConfig, AppError, CommitOutcome, DryRunTransport, PageController, PageEvent, app_version,
};
use cropform_capture::UnsupportedCameraBackend;
use cropform_core::{FileValue, FormMarkup, InputKind, parse_form_template};
use cropform_submit::SubmitClient;

#[derive(Parser, Debug)]
#[command(
    name = "cropform",
    version = cropform_app::APP_VERSION,
    about = "Headless photo-cropping form pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fill a form, crop its photos, and stage the multipart submission on disk
    Stage(StageArgs),
    /// Print the application version
    Version,
}

#[derive(Args, Debug)]
struct StageArgs {
    /// Form template JSON path
    #[arg(long)]
    template: PathBuf,
    /// Absolute URL of the page that receives the submission
    #[arg(long, default_value = "http://localhost:8000/form/")]
    page_url: String,
    /// Ordinary field value as NAME=VALUE; repeat for multiple checkbox values
    #[arg(long = "field", value_parser = parse_assignment)]
    fields: Vec<(String, String)>,
    /// Photo for a croppable field as NAME=PATH; cropped with the default region
    #[arg(long = "photo", value_parser = parse_assignment)]
    photos: Vec<(String, String)>,
    /// Document for a plain file field as NAME=PATH
    #[arg(long = "file", value_parser = parse_assignment)]
    files: Vec<(String, String)>,
    /// Directory receiving the staged request
    #[arg(long)]
    out: PathBuf,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got `{raw}`")),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Stage(args) => command_stage(args),
        Commands::Version => {
            println!("{}", app_version());
            Ok(())
        }
    }
}

fn command_stage(args: StageArgs) -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let template = parse_form_template(&fs::read_to_string(&args.template)?)?;
    let markup = FormMarkup::from_template(&template);

    let transport = Arc::new(DryRunTransport::new(&args.out));
    let client = SubmitClient::new(&args.page_url, transport)?;
    log::info!(target: "submit", "endpoint url={}", client.page_url());
    let mut page = PageController::new(
        markup.clone(),
        config,
        Arc::new(UnsupportedCameraBackend),
        client,
    );
    log::info!(
        target: "registry",
        "template={} slots={} policy={:?}",
        template.title,
        page.slots().len(),
        config.submission_policy
    );

    apply_fields(&mut page, &markup, &args.fields)?;

    for (name, path) in &args.files {
        let field = markup
            .fields
            .iter()
            .find(|field| &field.name == name && field.kind == InputKind::File)
            .ok_or_else(|| AppError::Config(format!("no file field named `{name}`")))?;
        page.dispatch(PageEvent::FilesChosen {
            input: field.id.clone(),
            files: vec![read_file(Path::new(path))?],
        });
    }

    for (name, path) in &args.photos {
        let input = page
            .slot_by_field(name)
            .map(|slot| slot.file_input.clone())
            .ok_or_else(|| AppError::Config(format!("no photo slot named `{name}`")))?;
        page.dispatch(PageEvent::FilesChosen {
            input,
            files: vec![read_file(Path::new(path))?],
        });
        match page.confirm_crop() {
            CommitOutcome::Committed { slot, digest } => {
                log::info!(target: "crop", "committed slot={slot} digest={digest}");
            }
            other => log::warn!(target: "crop", "photo `{name}` not committed: {other:?}"),
        }
    }

    let effect = page.dispatch(PageEvent::Submit);
    for message in page.ui_mut().take_messages() {
        println!("message: {message}");
    }
    match effect {
        cropform_app::EventEffect::Navigate(location) => {
            println!("staged: {}", args.out.display());
            println!("navigate: {location}");
            Ok(())
        }
        _ => Err(AppError::Config("submission was not accepted".to_string())),
    }
}

fn apply_fields(
    page: &mut PageController,
    markup: &FormMarkup,
    assignments: &[(String, String)],
) -> Result<(), AppError> {
    let mut checked: BTreeMap<&str, Vec<String>> = BTreeMap::new();

    for (name, value) in assignments {
        let field = markup
            .fields
            .iter()
            .find(|field| &field.name == name)
            .ok_or_else(|| AppError::Config(format!("no field named `{name}`")))?;
        match field.kind {
            InputKind::Checkbox(_) => checked.entry(name).or_default().push(value.clone()),
            InputKind::File => {
                return Err(AppError::Config(format!(
                    "`{name}` is a file field; use --photo or --file"
                )));
            }
            InputKind::Text => page.form_mut().set_text(name, value.as_str())?,
        }
    }

    for (name, values) in checked {
        page.form_mut().set_checked(name, values)?;
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<FileValue, AppError> {
    let bytes = fs::read(path)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content_type = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        _ => "",
    };
    Ok(FileValue::chosen(name, content_type, bytes))
}
