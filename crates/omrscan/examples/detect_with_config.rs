use omrscan::{Engine, EngineConfig, LayoutConfig, RasterImage};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <sheet.png> <questions> [options] [columns]", args[0]);
        std::process::exit(2);
    }

    let image = RasterImage::from_bytes(&std::fs::read(&args[1])?)?;
    let questions: usize = args[2].parse()?;
    let options: usize = args.get(3).map(|s| s.parse()).transpose()?.unwrap_or(4);
    let columns: usize = args.get(4).map(|s| s.parse()).transpose()?.unwrap_or(1);
    let layout = LayoutConfig::new(questions, options, columns).with_fill_threshold(0.45);

    let mut cfg = EngineConfig::default();
    cfg.deskew.tolerance_deg = 0.25;
    cfg.locator.min_circularity = 0.6;

    let result = Engine::with_config(cfg).detect(&image, &layout, true)?;
    if let Some(debug) = result.debug.as_ref() {
        println!(
            "Deskew: angle={:?}, applied={}, bubble radius {:.1}px",
            debug.deskew.estimated_angle_deg, debug.deskew.applied, debug.bubble_radius_px
        );
    }
    for (q, answer) in &result.answers {
        println!("{q:>3}: {}", answer.describe());
    }
    Ok(())
}
