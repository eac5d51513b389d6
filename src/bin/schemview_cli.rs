//! SchemView CLI - Render schematic previews
//!
//! Single mode renders one schematic; bulk mode reads one argument line per
//! schematic from a file and writes a JSON array of reports.
//! Exit codes: 2 invalid schematic, 3 schematic too big, 1 anything else.

use clap::{ArgAction, Parser};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use log::{error, info};
use uuid::Uuid;

use schemview_core::{
    options::DEFAULT_MEMORY_LIMIT,
    sprites::bootstrap,
    CatalogError, ContentCatalog, HexColor, LayoutModel, RenderError, RenderOptions,
    RenderPipeline, RenderReport,
};

#[derive(Parser, Debug)]
#[command(name = "schemview-cli")]
#[command(about = "SchemView CLI - Headless schematic preview renderer")]
struct Cli {
    /// Schematic document (JSON)
    schematic: Option<PathBuf>,

    /// Where to write the preview PNG
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the JSON report here instead of printing a text summary
    #[arg(short, long)]
    data_path: Option<PathBuf>,

    /// Create a preview image
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    preview: bool,

    /// Draw the background, shadow and border
    #[arg(long)]
    background: bool,

    /// Padding between the border and the schematic, in pixels
    #[arg(long, default_value_t = 32)]
    background_offset: u32,

    /// Border color (#rrggbb)
    #[arg(long, default_value = "#454545", value_parser = parse_color)]
    border_color: HexColor,

    /// Add the resource summary panel
    #[arg(long)]
    summary: bool,

    /// Pixels per summary cell
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    summary_cell_size: u32,

    /// Bulk job file: one set of arguments per line
    #[arg(long)]
    bulk: Option<PathBuf>,

    /// Sprite directory [default: sprites]
    #[arg(long)]
    sprites: Option<PathBuf>,

    /// Content catalog (defaults to the built-in one)
    #[arg(long)]
    content: Option<PathBuf>,

    /// Bytes a render may allocate
    #[arg(long, env = "SCHEMVIEW_MEMORY_LIMIT", default_value_t = DEFAULT_MEMORY_LIMIT)]
    memory_limit: u64,

    /// Inline the preview as base64 in the JSON report
    #[arg(long)]
    embed_preview: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

const DEFAULT_SPRITES: &str = "sprites";

fn parse_color(s: &str) -> Result<HexColor, String> {
    s.parse()
}

impl Cli {
    /// Problems that clap cannot express on its own.
    fn problems(&self, in_bulk: bool) -> Vec<String> {
        let mut problems = vec![];

        if self.schematic.is_none() {
            problems.push("A schematic path is required".to_string());
        }
        if in_bulk {
            if self.bulk.is_some() {
                problems.push("--bulk cannot be nested".to_string());
            }
            if self.data_path.is_some() {
                problems.push("--data-path is not allowed in bulk lines".to_string());
            }
            if self.output.is_some() {
                problems.push("--output is not allowed in bulk lines".to_string());
            }
            if self.sprites.is_some() {
                problems.push("--sprites is not allowed in bulk lines".to_string());
            }
            if self.content.is_some() {
                problems.push("--content is not allowed in bulk lines".to_string());
            }
            if self.verbose {
                problems.push("--verbose is not allowed in bulk lines".to_string());
            }
        } else if self.preview && self.output.is_none() {
            problems.push("--output is required when creating a preview".to_string());
        }

        problems
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            draw_background: self.background,
            background_padding: self.background_offset,
            border_color: self.border_color,
            create_image: self.preview,
            enable_content_summary: self.summary,
            summary_cell_size: self.summary_cell_size,
            memory_limit: self.memory_limit,
            ..Default::default()
        }
    }
}

struct Failure {
    code: u8,
    message: String,
}

impl Failure {
    fn new(message: impl Into<String>) -> Self {
        Self { code: 1, message: message.into() }
    }
}

impl From<RenderError> for Failure {
    fn from(e: RenderError) -> Self {
        let code = match e {
            RenderError::InvalidSchematic(_) => 2,
            RenderError::TooBig { .. } => 3,
            RenderError::Other(_) => 1,
        };
        Self { code, message: e.to_string() }
    }
}

impl From<CatalogError> for Failure {
    fn from(e: CatalogError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<std::io::Error> for Failure {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<serde_json::Error> for Failure {
    fn from(e: serde_json::Error) -> Self {
        Self::new(e.to_string())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            error!("{}", failure.message);
            let output = serde_json::json!({
                "success": false,
                "error": failure.message,
            });
            println!("{}", output);
            ExitCode::from(failure.code)
        }
    }
}

fn run(cli: &Cli) -> Result<(), Failure> {
    // Arguments are checked before any asset is read
    let jobs = match &cli.bulk {
        Some(bulk) => Some(parse_bulk(cli, bulk)?),
        None => {
            let problems = cli.problems(false);
            if !problems.is_empty() {
                return Err(Failure::new(problems.join("; ")));
            }
            None
        }
    };

    let start = Instant::now();
    let content = match &cli.content {
        Some(path) => ContentCatalog::load(path)?,
        None => ContentCatalog::builtin()?,
    };
    let sprite_dir = cli.sprites.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_SPRITES));
    let sprites = bootstrap(&sprite_dir)?;
    info!("Catalogs ready in {} ms", start.elapsed().as_millis());

    let pipeline = RenderPipeline::new(sprites, &content);

    match jobs {
        Some(jobs) => run_bulk(cli, &jobs, &pipeline),
        None => run_single(cli, &pipeline),
    }
}

fn run_single(cli: &Cli, pipeline: &RenderPipeline<'_>) -> Result<(), Failure> {
    let report = render_one(cli, pipeline, cli.output.as_deref())?;

    match &cli.data_path {
        Some(data_path) => {
            fs::write(data_path, serde_json::to_string_pretty(&report)? + "\n")?;
        }
        None => print!("{}", report.metadata.to_text("> ")),
    }
    Ok(())
}

/// Every bulk line as its own argument set; all line problems are reported together.
fn parse_bulk(cli: &Cli, bulk: &Path) -> Result<Vec<Cli>, Failure> {
    if cli.data_path.is_none() {
        return Err(Failure::new("--data-path is required in bulk mode"));
    }

    let text = fs::read_to_string(bulk)?;
    let mut jobs = vec![];
    let mut problems = vec![];

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let args = std::iter::once("schemview-cli").chain(line.split_whitespace());
        match Cli::try_parse_from(args) {
            Ok(job) => {
                for problem in job.problems(true) {
                    problems.push(format!("line {}: {}", number + 1, problem));
                }
                jobs.push(job);
            }
            Err(e) => problems.push(format!("line {}: {}", number + 1, e.to_string().trim())),
        }
    }

    if !problems.is_empty() {
        return Err(Failure::new(problems.join("\n")));
    }
    Ok(jobs)
}

fn run_bulk(cli: &Cli, jobs: &[Cli], pipeline: &RenderPipeline<'_>) -> Result<(), Failure> {
    let data_path = cli
        .data_path
        .as_ref()
        .ok_or_else(|| Failure::new("--data-path is required in bulk mode"))?;

    info!("Parsing {} schematics", jobs.len());
    let out_dir = data_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut reports = Vec::with_capacity(jobs.len());
    for job in jobs {
        let preview = out_dir.join(format!("schem-preview-{}.png", Uuid::new_v4()));
        let target = if job.preview { Some(preview.as_path()) } else { None };
        reports.push(render_one(job, pipeline, target)?);
    }

    fs::write(data_path, serde_json::to_string_pretty(&reports)? + "\n")?;
    info!("Done");
    Ok(())
}

fn render_one(cli: &Cli, pipeline: &RenderPipeline<'_>, target: Option<&Path>) -> Result<RenderReport, Failure> {
    let path = cli
        .schematic
        .as_ref()
        .ok_or_else(|| Failure::new("A schematic path is required"))?;

    let layout = LayoutModel::load(path, pipeline.content())?;
    let output = pipeline.render(&layout, &cli.render_options())?;
    let report = RenderReport::new(&layout, output.metadata);

    match (output.image, target) {
        (Some(image), Some(target)) => {
            let png = image.save_png(target)?;
            info!("Wrote {}", target.display());
            Ok(report.with_preview(&target.display().to_string(), &png, cli.embed_preview))
        }
        _ => Ok(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("schemview-cli").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_bulk_line_rejects_process_wide_flags() {
        let job = parse(&["s.json", "--sprites", "art", "--content", "blocks.json", "-v"]);
        let problems = job.problems(true);

        assert!(problems.iter().any(|p| p.contains("--sprites")));
        assert!(problems.iter().any(|p| p.contains("--content")));
        assert!(problems.iter().any(|p| p.contains("--verbose")));
    }

    #[test]
    fn test_plain_bulk_line_accepted() {
        let job = parse(&["s.json", "--background", "--summary"]);
        assert!(job.problems(true).is_empty());
    }

    #[test]
    fn test_missing_output_reported_before_assets_load() {
        let cli = parse(&["s.json", "--sprites", "/no/such/sprite/dir"]);

        let failure = run(&cli).err().unwrap();
        assert_eq!(failure.code, 1);
        assert!(failure.message.contains("--output"), "{}", failure.message);
    }

    #[test]
    fn test_bad_bulk_line_reported_before_assets_load() {
        let dir = tempfile::tempdir().unwrap();
        let bulk = dir.path().join("jobs.txt");
        fs::write(&bulk, "a.json\nb.json --no-such-flag\n").unwrap();

        let data = dir.path().join("out.json");
        let cli = parse(&[
            "--bulk",
            bulk.to_str().unwrap(),
            "--data-path",
            data.to_str().unwrap(),
            "--sprites",
            "/no/such/sprite/dir",
        ]);

        let failure = run(&cli).err().unwrap();
        assert!(failure.message.starts_with("line 2:"), "{}", failure.message);
        assert!(!data.exists());
    }
}
