// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe CSG command-line driver

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use polyframe_csg::cli::Reporter;
use polyframe_csg::config::CONFIG_FILE_NAME;
use polyframe_csg::{analyze, export_stl, scenes, CompilerConfig, CsgCompiler, Mesh};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polyframe-csg", version)]
#[command(about = "Compile OpenSCAD-style CSG scripts into STL meshes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Script file (.scad/.csg) or a built-in scene (example001..example004)
    #[arg(value_name = "CSGFILE")]
    input: Option<String>,

    /// Output STL file, or `none` to skip writing
    #[arg(value_name = "OUTPUT", default_value = "out.stl")]
    output: String,

    #[command(flatten)]
    options: Options,
}

#[derive(clap::Args)]
struct Options {
    /// Keep coplanar facets of the boolean result separate
    #[arg(long)]
    no_simplify_coplanar_facets: bool,

    /// Angle in degrees below which facets count as coplanar
    #[arg(long, value_name = "DEGREES")]
    coplanar_angle_tolerance: Option<f64>,

    /// Use ear clipping instead of Delaunay retriangulation
    #[arg(long)]
    no_delaunay: bool,

    /// Test every facet pair instead of bounding-volume neighbors
    #[arg(long)]
    no_detect_intersecting_neighbors: bool,

    /// Disable the pass-through for disjoint union components
    #[arg(long)]
    no_fast_union: bool,

    /// Concatenate operands instead of computing booleans
    #[arg(long)]
    noop: bool,

    /// Drop every cached import before compiling
    #[arg(long)]
    clear_cache: bool,

    /// Trust cached imports regardless of file timestamps
    #[arg(long)]
    ignore_cache_time: bool,

    /// Persist converted imports in this directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Configuration file (defaults to polyframe-csg.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log stage summaries
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log per-stage detail
    #[arg(long, global = true)]
    fine_verbose: bool,

    /// Evaluate sibling subtrees in parallel
    #[arg(long)]
    parallel: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a script and print its scene tree as JSON
    Parse {
        /// Input script
        input: PathBuf,

        /// Output JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.options.verbose, cli.options.fine_verbose);

    let result = match &cli.command {
        Some(Commands::Parse { input, output }) => parse_command(input, output.as_deref(), &cli.options),
        None => match &cli.input {
            Some(input) => compile_command(input, &cli.output, &cli.options),
            None => {
                Reporter::report_error("missing input file");
                eprintln!("Usage: polyframe-csg [FLAGS] <csgfile | example001..example004> [output|none]");
                return ExitCode::from(1);
            }
        },
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            Reporter::report_error(&format!("{:#}", e));
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool, fine_verbose: bool) {
    let default_level = if fine_verbose {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Without a configuration file the driver runs with fast union on and
/// sibling parallelism off. Flags override either source.
fn load_config(options: &Options) -> Result<CompilerConfig> {
    let mut config = match &options.config {
        Some(path) => CompilerConfig::from_file(path)?,
        None if Path::new(CONFIG_FILE_NAME).exists() => CompilerConfig::load()?,
        None => {
            let mut config = CompilerConfig::load()?;
            config.builder.fast_union = true;
            config.builder.parallel = false;
            config
        }
    };

    let builder = &mut config.builder;
    if options.no_simplify_coplanar_facets {
        builder.simplify_coplanar_facets = false;
    }
    if let Some(angle) = options.coplanar_angle_tolerance {
        builder.coplanar_angle_tolerance = angle;
    }
    if options.no_delaunay {
        builder.delaunay = false;
    }
    if options.no_detect_intersecting_neighbors {
        builder.detect_intersecting_neighbors = false;
    }
    if options.no_fast_union {
        builder.fast_union = false;
    }
    builder.noop |= options.noop;
    if options.parallel {
        builder.parallel = true;
    }

    config.clear_cache |= options.clear_cache;
    config.ignore_cache_time |= options.ignore_cache_time;
    config.verbose |= options.verbose;
    config.fine_verbose |= options.fine_verbose;
    if options.cache_dir.is_some() {
        config.cache_dir = options.cache_dir.clone();
    }
    Ok(config)
}

fn compile_command(input: &str, output: &str, options: &Options) -> Result<ExitCode> {
    let compiler = CsgCompiler::with_config(load_config(options)?);

    let start = Instant::now();
    let mesh = match compile(&compiler, input) {
        Ok(mesh) => mesh,
        Err(e) => {
            Reporter::report_error(&format!("{:#}", e));
            println!("{}", "No output".yellow());
            return Ok(ExitCode::from(2));
        }
    };
    let duration = start.elapsed();

    if mesh.is_empty() {
        println!("{}", "No output".yellow());
        return Ok(ExitCode::from(2));
    }

    Reporter::report_render(input, &analyze(&mesh), duration);

    if output != "none" {
        let path = Path::new(output);
        export_stl(&mesh, path).with_context(|| format!("failed to write {}", output))?;
        Reporter::success(&format!("Wrote {}", path.display()));
    }
    Ok(ExitCode::SUCCESS)
}

/// Evaluate a built-in scene or a script file
fn compile(compiler: &CsgCompiler, input: &str) -> Result<Mesh> {
    if let Some(node) = scenes::example(input, compiler.builder()) {
        return Ok(compiler.evaluate(&node)?);
    }
    let path = Path::new(input);
    if !path.exists() {
        anyhow::bail!("input file not found: {}", input);
    }
    Ok(compiler.compile_file(path)?)
}

fn parse_command(input: &Path, output: Option<&Path>, options: &Options) -> Result<ExitCode> {
    let compiler = CsgCompiler::with_config(load_config(options)?);
    let node = compiler.parse_file(input)?;
    let json = serde_json::to_string_pretty(&node).context("failed to serialize scene tree")?;

    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            if options.verbose {
                Reporter::success(&format!("Scene tree written to {}", path.display()));
            }
        }
        None => println!("{}", json),
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(dir: &TempDir, toml: &str, flags: &[&str]) -> Options {
        let config = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config, toml).unwrap();

        let mut args = vec!["polyframe-csg".to_string(), "--config".to_string()];
        args.push(config.display().to_string());
        args.extend(flags.iter().map(|flag| flag.to_string()));
        args.push("model.scad".to_string());
        Cli::try_parse_from(args).unwrap().options
    }

    #[test]
    fn test_config_file_values_survive_without_flags() {
        let dir = TempDir::new().unwrap();
        let toml = "[builder]\nfast_union = false\nparallel = true\n";
        let config = load_config(&options(&dir, toml, &[])).unwrap();
        assert!(!config.builder.fast_union);
        assert!(config.builder.parallel);
    }

    #[test]
    fn test_flags_override_the_config_file() {
        let dir = TempDir::new().unwrap();
        let toml = "[builder]\nfast_union = true\nparallel = false\n";
        let flags = ["--no-fast-union", "--parallel"];
        let config = load_config(&options(&dir, toml, &flags)).unwrap();
        assert!(!config.builder.fast_union);
        assert!(config.builder.parallel);
    }

    #[test]
    fn test_compile_failure_exits_with_two() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("broken.scad");
        std::fs::write(&script, "cube([1, 2);").unwrap();

        let options = options(&dir, "", &[]);
        let code = compile_command(&script.display().to_string(), "none", &options).unwrap();
        assert_eq!(code, ExitCode::from(2));

        let missing = dir.path().join("missing.scad");
        let code = compile_command(&missing.display().to_string(), "none", &options).unwrap();
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn test_successful_compile_exits_with_zero() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("part.scad");
        std::fs::write(&script, "cube(1);").unwrap();

        let code = compile_command(&script.display().to_string(), "none", &options(&dir, "", &[])).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }
}
