//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI 3.0 document for the DermaGlow REST API to disk, so
//! it can be committed or fed to a client generator without starting the
//! server.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Output path is the first argument, if given.
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());

    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&path, spec_json)?;
    println!("OpenAPI specification generated at {}", path);
    Ok(())
}
