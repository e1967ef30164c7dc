//! orbtool - convert FBX/OBJ/MTL/raw inputs into `.orb` containers and inspect them.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use orbit_assets::prelude::*;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("ORBTOOL_BUILD_DATE"),
    " ",
    env!("ORBTOOL_BUILD_TIME"),
    ")"
);

#[derive(Parser)]
#[command(name = "orbtool", version = VERSION)]
#[command(about = "Orbit asset converter and .orb inspector")]
struct Cli {
    /// Show debug output (-vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only show errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the objects of a container, or decode one of them
    #[command(visible_alias = "a")]
    Analyze {
        file: PathBuf,

        /// Print every field of the object with this id
        #[arg(short, long)]
        item: Option<u64>,
    },

    /// Convert input files into one container
    #[command(visible_alias = "r")]
    Read {
        /// .fbx, .obj, .mtl or .raw inputs, loaded in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,

        /// Fan-triangulate polygons with more than three vertices
        #[arg(short, long)]
        triangulate: bool,

        /// Append to an existing container of the current version
        #[arg(short, long)]
        append: bool,

        /// Options file (JSON); defaults to the per-user options
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Shader compiler executable
        #[arg(long)]
        compiler: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Analyze { file, item } => cmd_analyze(&file, item),
        Command::Read {
            inputs,
            output,
            triangulate,
            append,
            config,
            compiler,
        } => {
            let mut options = match config {
                Some(path) => ConvertOptions::load(&path)
                    .with_context(|| format!("loading options from {}", path.display()))?,
                None => ConvertOptions::load_or_default(),
            };
            if triangulate {
                options.triangulate = true;
            }
            if let Some(compiler) = compiler {
                options.compiler = compiler;
            }
            cmd_read(&inputs, &output, append, &options)
        }
    }
}

fn cmd_analyze(path: &Path, item: Option<u64>) -> Result<()> {
    let mut file = OrbFile::open(path).with_context(|| format!("opening {}", path.display()))?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match item {
        Some(id) => {
            let item = file
                .item_details(id)
                .with_context(|| format!("decoding item {} of {}", id, path.display()))?;
            write!(out, "{}", item)?;
        }
        None => file.print_index(&mut out)?,
    }
    Ok(())
}

fn cmd_read(inputs: &[PathBuf], output: &Path, append: bool, options: &ConvertOptions) -> Result<()> {
    debug!(?options, "conversion options");
    let mut batch = OrbIntermediate::new();
    for input in inputs {
        load_file(input, &mut batch, options).with_context(|| format!("reading {}", input.display()))?;
    }

    let compiler = FxcCompiler::from_options(options);
    let total = if append {
        let writer = OrbWriter::append(output).with_context(|| format!("opening {} for append", output.display()))?;
        write_batch(writer.with_compiler(compiler), &batch, output)?
    } else {
        // Build next to the output and replace it only once the batch is written.
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".orbtool")
            .suffix(".orb")
            .tempfile_in(dir)
            .with_context(|| format!("creating a temporary file in {}", dir.display()))?;
        let writer = OrbWriter::create(temp.path()).with_context(|| format!("creating {}", output.display()))?;
        let total = write_batch(writer.with_compiler(compiler), &batch, output)?;
        temp.persist(output)
            .with_context(|| format!("replacing {}", output.display()))?;
        total
    };
    info!("{}: {} object(s) written, {} total", output.display(), batch.len(), total);
    Ok(())
}

fn write_batch(mut writer: OrbWriter, batch: &OrbIntermediate, output: &Path) -> Result<u32> {
    writer
        .write(batch)
        .with_context(|| format!("writing {}", output.display()))?;
    let total = writer.object_count();
    writer.finish()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_read_arguments() {
        let cli = Cli::parse_from(["orbtool", "-v", "read", "a.obj", "b.raw", "-o", "out.orb", "--triangulate"]);
        assert_eq!(cli.verbose, 1);
        let Command::Read { inputs, output, triangulate, append, .. } = cli.command else {
            panic!("expected read");
        };
        assert_eq!(inputs, vec![PathBuf::from("a.obj"), PathBuf::from("b.raw")]);
        assert_eq!(output, PathBuf::from("out.orb"));
        assert!(triangulate);
        assert!(!append);
    }

    #[test]
    fn test_failed_conversion_keeps_output() {
        let dir = tempfile::tempdir().unwrap();
        let shader = dir.path().join("vs.hlsl");
        std::fs::write(&shader, "float4 main() : SV_Position { return 0; }").unwrap();
        let scene = dir.path().join("scene.raw");
        std::fs::write(
            &scene,
            r#"read { "vs.hlsl" as SHADER(VERTEX) "vs" compile("main", "vs_5_0"); };"#,
        )
        .unwrap();
        let output = dir.path().join("out.orb");
        std::fs::write(&output, b"previous").unwrap();

        let options = ConvertOptions {
            compiler: dir.path().join("no-such-compiler"),
            ..Default::default()
        };
        assert!(cmd_read(&[scene], &output, false, &options).is_err());
        assert_eq!(std::fs::read(&output).unwrap(), b"previous");
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 3);
    }

    #[test]
    fn test_read_requires_output() {
        assert!(Cli::try_parse_from(["orbtool", "read", "a.obj"]).is_err());
    }
}
