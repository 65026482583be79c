use anyhow::Result;

fn main() -> Result<()> {
    let spec = vidhub::api::openapi();
    println!("{}", spec.to_pretty_json()?);
    Ok(())
}
