use omrscan::{AnswerKey, Engine, LayoutConfig, RasterImage};
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "Usage: {} <layout.json> <key.json> <sheet.png> [out.json]",
            args[0]
        );
        std::process::exit(2);
    }

    let layout = LayoutConfig::from_json_file(Path::new(&args[1]))?;
    let key = AnswerKey::from_json_file(Path::new(&args[2]))?;
    let image = RasterImage::from_bytes(&std::fs::read(&args[3])?)?;

    let result = Engine::new().evaluate(&image, &layout, &key, false)?;
    println!(
        "Score {}/{} ({:.2}%), {} unmarked, {} ambiguous.",
        result.score, result.total, result.percentage, result.unmarked, result.ambiguous
    );

    if let Some(out_path) = args.get(4) {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
