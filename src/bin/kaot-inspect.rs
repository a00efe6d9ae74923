//! Inspection tool for type layouts and emitted method-boundary tables.

use std::fs;
use std::path::PathBuf;

use bumpalo::Bump;
use clap::{Parser, Subcommand};
use kaot::image::read_boundary_table;
use kaot::{CompilationSession, CompilerOptions, TypeRegistry};

#[derive(Parser)]
#[command(name = "kaot-inspect", version, about = "Inspect kaot type layouts and kernel images")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Target pointer size in bytes.
    #[arg(long, default_value_t = 4, global = true)]
    pointer_size: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the internal type and size of every type in a description file.
    Layout { file: PathBuf },
    /// Print the method-boundary table of an emitted object.
    Boundaries { object: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Layout { file } => {
            let text = fs::read_to_string(&file)?;
            let registry = TypeRegistry::from_source(&text, cli.pointer_size)?;

            let arena = Bump::new();
            let options = CompilerOptions::default().with_pointer_size(cli.pointer_size);
            let session = CompilationSession::new(&arena, options);

            for (id, descriptor) in registry.iter() {
                let layout = session.class_layout(&registry, id);
                let size = if layout.is_sized() {
                    format!("{} bytes", layout.size)
                } else {
                    "unsized".to_string()
                };
                println!(
                    "{:<40} {:<9} {:<9} {}",
                    descriptor.target_full_name(),
                    descriptor.kind.keyword(),
                    layout.internal_type,
                    size
                );
            }
        }
        Command::Boundaries { object } => {
            let data = fs::read(&object)?;
            let table = read_boundary_table(&data)?;

            for boundary in table.entries() {
                let name = table.name_of(boundary.method).unwrap_or("?");
                println!("{boundary} {:>6} {name}", boundary.len());
            }
            println!("{} methods", table.len());
        }
    }

    Ok(())
}
