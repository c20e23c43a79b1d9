//! Command line inspection tool for LVZ packages and map metadata

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lvz_parser::{ElvlChunk, ElvlCollection, LvzPackage, ParserConfig, ValidationConfig};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Resource limits applied while decoding
    #[clap(long, value_enum, global = true, default_value_t = Limits::Default)]
    limits: Limits,

    #[clap(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Limits {
    Default,
    /// Tight limits for files from untrusted sources
    Strict,
    /// Loose limits for unusually large packages
    Permissive,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a package summary as JSON
    LvzInfo {
        path: PathBuf,
        /// Fail on sections without CONT magic instead of skipping them
        #[clap(long)]
        strict: bool,
        /// Skip range validation of decoded entities
        #[clap(long)]
        no_validate: bool,
    },
    /// Write every embedded resource to a directory
    LvzExtract {
        path: PathBuf,
        #[clap(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Decode a package and compile it again
    LvzRoundtrip { input: PathBuf, output: PathBuf },
    /// Print the metadata of a map file as JSON
    ElvlInfo { path: PathBuf },
}

#[derive(Serialize)]
struct ResourceSummary<'a> {
    name: &'a str,
    size: usize,
    time: i64,
}

#[derive(Serialize)]
struct FailureSummary<'a> {
    index: usize,
    name: &'a str,
    error: String,
}

#[derive(Serialize)]
struct PackageSummary<'a> {
    name: &'a str,
    format: Option<lvz_parser::ObjectFormat>,
    resources: Vec<ResourceSummary<'a>>,
    images: &'a [lvz_parser::CompiledImage],
    map_objects: &'a [lvz_parser::CompiledMapObject],
    screen_objects: &'a [lvz_parser::CompiledScreenObject],
    failed_sections: Vec<FailureSummary<'a>>,
}

#[derive(Serialize)]
struct RegionSummary<'a> {
    name: &'a str,
    tiles: usize,
    is_base: bool,
    no_antiwarp: bool,
    no_weapons: bool,
    no_flag_drops: bool,
    auto_warp: Option<&'a lvz_parser::AutoWarp>,
    unknown_chunks: Vec<String>,
}

#[derive(Serialize)]
struct ElvlSummary<'a> {
    attributes: &'a [lvz_parser::elvl::Attribute],
    regions: Vec<RegionSummary<'a>>,
    chunks: Vec<String>,
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("path is not valid UTF-8: {}", path.display()))
}

fn parser_config(limits: Limits) -> ParserConfig {
    match limits {
        Limits::Default => ParserConfig::default(),
        Limits::Strict => ParserConfig::security_focused(),
        Limits::Permissive => ParserConfig::permissive(),
    }
}

fn lvz_info(path: &Path, parser: &ParserConfig, validation: &ValidationConfig) -> Result<()> {
    let (package, failures) = LvzPackage::from_path_recovering(path_str(path)?, parser, validation)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let summary = PackageSummary {
        name: &package.name,
        format: package.source_format,
        resources: package
            .resources
            .iter()
            .map(|r| ResourceSummary {
                name: &r.name,
                size: r.data.len(),
                time: r.time,
            })
            .collect(),
        images: &package.images,
        map_objects: &package.map_objects,
        screen_objects: &package.screen_objects,
        failed_sections: failures
            .iter()
            .map(|f| FailureSummary {
                index: f.index,
                name: &f.name,
                error: f.error.to_string(),
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn lvz_extract(path: &Path, out: &Path, parser: &ParserConfig) -> Result<()> {
    let (package, failures) =
        LvzPackage::from_path_recovering(path_str(path)?, parser, &ValidationConfig::default())
            .with_context(|| format!("failed to read {}", path.display()))?;
    for failure in &failures {
        warn!(section = %failure.name, error = %failure.error, "not extracted");
    }

    std::fs::create_dir_all(out).with_context(|| format!("failed to create {}", out.display()))?;
    for resource in &package.resources {
        // Never let a stored name escape the output directory
        let Some(file_name) = Path::new(&resource.name).file_name() else {
            bail!("resource name '{}' is not a file name", resource.name);
        };
        let target = out.join(file_name);
        std::fs::write(&target, &resource.data)
            .with_context(|| format!("failed to write {}", target.display()))?;
        info!(resource = %resource.name, bytes = resource.data.len(), "extracted");
    }
    println!("extracted {} resources to {}", package.resources.len(), out.display());
    Ok(())
}

fn lvz_roundtrip(input: &Path, output: &Path, parser: &ParserConfig) -> Result<()> {
    let package = LvzPackage::from_path_with_config(path_str(input)?, parser, &ValidationConfig::default())
        .with_context(|| format!("failed to read {}", input.display()))?;
    package
        .save(path_str(output)?)
        .with_context(|| format!("failed to write {}", output.display()))?;

    let before = std::fs::metadata(input)?.len();
    let after = std::fs::metadata(output)?.len();
    info!(before, after, "package rewritten");
    println!(
        "{} -> {}: {} resources, {} images, {} objects",
        input.display(),
        output.display(),
        package.resources.len(),
        package.images.len(),
        package.map_objects.len() + package.screen_objects.len()
    );
    Ok(())
}

fn elvl_info(path: &Path, parser: &ParserConfig) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let elvl = ElvlCollection::from_map_bytes_with_config(&data, parser)
        .with_context(|| format!("failed to decode metadata of {}", path.display()))?;

    let summary = ElvlSummary {
        attributes: &elvl.attributes,
        regions: elvl
            .regions
            .iter()
            .map(|r| RegionSummary {
                name: &r.name,
                tiles: r.tiles.count(),
                is_base: r.is_base,
                no_antiwarp: r.no_antiwarp,
                no_weapons: r.no_weapons,
                no_flag_drops: r.no_flag_drops,
                auto_warp: r.auto_warp.as_ref(),
                unknown_chunks: r.unknown_chunks.iter().map(|c| c.tag_name()).collect(),
            })
            .collect(),
        chunks: elvl
            .chunks
            .iter()
            .map(|chunk| match chunk {
                ElvlChunk::Raw { tag, data } => {
                    format!("{} (raw, {} bytes)", lvz_parser::utils::tag_to_string(tag), data.len())
                },
                other => lvz_parser::utils::tag_to_string(&other.tag()),
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let parser = parser_config(args.limits);

    match args.command {
        Command::LvzInfo {
            path,
            strict,
            no_validate,
        } => {
            let validation = ValidationConfig {
                validate_decoded: !no_validate,
                strict_mode: strict,
                ..ValidationConfig::default()
            };
            lvz_info(&path, &parser, &validation)
        },
        Command::LvzExtract { path, out } => lvz_extract(&path, &out, &parser),
        Command::LvzRoundtrip { input, output } => lvz_roundtrip(&input, &output, &parser),
        Command::ElvlInfo { path } => elvl_info(&path, &parser),
    }
}
