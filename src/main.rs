use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use mdlink::{analyze_dependencies, export_document, import_document};

#[derive(Parser, Debug)]
#[command(author, version, about = "Parse legacy .mdl block-diagram files to JSON", long_about = None)]
struct Cli {
    /// Model or library document in the brace-delimited format
    #[arg(value_name = "MDL_FILE")]
    mdl_file: String,

    /// Re-serialize the imported model back to the interchange format
    /// instead of printing JSON
    #[arg(long)]
    export: bool,

    /// Print the library dependency report instead of the model
    #[arg(long)]
    deps: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let path = Utf8PathBuf::from(&cli.mdl_file);
    let text = std::fs::read_to_string(&path).with_context(|| format!("Open {}", path))?;

    if cli.deps {
        let report = analyze_dependencies(&text)
            .with_context(|| format!("Failed to analyze {}", path))?;
        for r in &report.external_references {
            println!("{} -> {}/{}", r.referenced_by, r.library, r.block_path);
        }
        for lib in &report.missing_libraries {
            println!("missing: {}", lib);
        }
        return Ok(());
    }

    let model = import_document(&text).with_context(|| format!("Failed to parse {}", path))?;
    if cli.export {
        print!("{}", export_document(&model));
    } else {
        let json = serde_json::to_string_pretty(&model)?;
        println!("{}", json);
    }
    Ok(())
}
