//! Writes the OpenAPI document for the conversation API.

use clap::Parser;
use consult_api::router::ApiDoc;
use std::path::PathBuf;
use utoipa::OpenApi;

#[derive(Parser, Debug)]
#[command(name = "openapi", about = "Export the OpenAPI document as JSON")]
struct Cli {
    #[arg(default_value = "openapi.json")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let document = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&cli.output, document)?;
    println!("Wrote {}", cli.output.display());
    Ok(())
}
