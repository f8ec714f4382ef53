use rankrat_back::services::documentation::{ApiDoc, FleetApiDoc};
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let doc = match std::env::args().nth(1).as_deref() {
        Some("fleet") => FleetApiDoc::openapi(),
        _ => ApiDoc::openapi(),
    };
    println!("{}", doc.to_pretty_json()?);
    Ok(())
}
