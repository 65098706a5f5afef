use image::ImageReader;
use inkform::ProcessingOptions;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <scan.png> [out.json]", args[0]);
        std::process::exit(2);
    }

    let scan = ImageReader::open(&args[1])?.decode()?.to_rgba8();
    let opts = ProcessingOptions::default();
    let result = inkform::process_template_page(&scan, &opts);

    if !result.success {
        eprintln!("processing failed: {:?}", result.error);
        std::process::exit(1);
    }
    println!("Extracted {} glyphs.", result.glyphs.len());

    if let Some(out_path) = args.get(2) {
        let json = serde_json::to_string_pretty(&result.glyphs)?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
