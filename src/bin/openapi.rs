use anyhow::Result;

// Print the OpenAPI document for the HTTP surface.
fn main() -> Result<()> {
    let doc = portal::api::openapi();
    println!("{}", doc.to_pretty_json()?);
    Ok(())
}
