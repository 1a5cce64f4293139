use wextract::{ExtractSettings, WtError, WtExtractor, WtReader};

use flexi_logger::{Logger, opt_format};

const USAGE: &str = "Usage: wt_extract <input.wav> <output.wav> [settings.json]";

fn run(input: &str, output: &str, settings_file: Option<&str>) -> Result<(), WtError> {
    let settings = match settings_file {
        Some(filename) => ExtractSettings::from_file(filename)?,
        None => ExtractSettings::default(),
    };
    let bits = settings.output_bits;
    let sample_rate = settings.output_sample_rate;
    let extractor = WtExtractor::new(settings)?;

    // Filenames are relative to the current path
    let reader = WtReader::new("");
    let buffer = reader.read_file(input)?;
    println!("{}: {} channels, {} Hz, {:.3} seconds",
        input, buffer.num_channels, buffer.sample_rate, buffer.duration());

    let (table, harmonics) = extractor.extract(&buffer)?;
    println!("{} harmonics:", harmonics.len());
    for (i, h) in harmonics.iter().enumerate() {
        println!("{:3}: {:10.3} Hz, magnitude {:12.4}, phase {:7.4}",
            i + 1, h.frequency, h.magnitude(), h.phase());
    }

    reader.write_table(&table, output, bits, sample_rate)?;
    println!("Wrote {} samples to {}", table.len(), output);
    Ok(())
}

fn main () {
    Logger::with_env_or_str("wt_extract=info, wextract=info")
                            .log_to_file()
                            .directory("log_files")
                            .format(opt_format)
                            .start()
                            .unwrap();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }

    if let Err(err) = run(&args[1], &args[2], args.get(3).map(|s| s.as_str())) {
        eprintln!("Extraction failed: {}", err);
        std::process::exit(1);
    }
}
