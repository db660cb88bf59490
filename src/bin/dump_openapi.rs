use std::fs;

/// Write the OpenAPI document to disk for clients that generate bindings
/// offline. Output path is the first argument, `openapi.json` by default.
fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).unwrap_or_else(|| "openapi.json".to_string());

    let doc = campus_core::docs::build_openapi(8000)?;
    fs::write(&path, serde_json::to_string_pretty(&doc)?)?;
    println!("wrote {path}");

    Ok(())
}
