//! debrisd - space debris tracking daemon
//!
//! Wires the tracker together and drives it from an interactive menu:
//! 1. Loads configuration (file + env overrides)
//! 2. Initializes the field-encryption key provider (created on first run)
//! 3. Starts the capture loop against the configured source
//! 4. Serves controller commands until exit or Ctrl-C

use anyhow::Result;
use clap::Parser;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use debris_tracker::{
    open_source, DebrisTracker, FieldCodec, KeyProvider, PlainCodec, TraceVisualizer,
    TrackerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "debrisd", about = "Space debris tracking daemon")]
struct Args {
    /// Override the configured video source (e.g. stub://telescope)
    #[arg(long)]
    source: Option<String>,

    /// Persist fields as plaintext instead of sealed ciphertext
    #[arg(long)]
    plaintext: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = TrackerConfig::load()?;
    if let Some(source) = args.source {
        cfg.source.url = source;
    }

    let codec: Box<dyn FieldCodec> = if args.plaintext {
        log::warn!("storing detections as plaintext");
        Box::new(PlainCodec)
    } else {
        let provider = KeyProvider::new(&cfg.storage.key_path);
        let codec = provider.codec()?;
        log::info!("field key ready at {}", provider.path().display());
        Box::new(codec)
    };

    let mut tracker = DebrisTracker::new(cfg.detection.thresholds()?, cfg.visualization_enabled);

    let mut source = open_source(&cfg.source)?;
    source.connect()?;
    tracker.start(source, Box::new(TraceVisualizer))?;
    log::info!("debrisd running against {}", cfg.source.url);

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        })?;
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        print_menu();
        let Some(line) = lines.next() else {
            break;
        };
        let choice = match line {
            Ok(line) => line.trim().to_string(),
            Err(_) => break,
        };
        if interrupted.load(Ordering::SeqCst) {
            break;
        }

        match choice.as_str() {
            "1" => {
                let enabled = tracker.toggle_visualization();
                println!(
                    "Visualization {}.",
                    if enabled { "enabled" } else { "disabled" }
                );
            }
            "2" => match tracker.save(&cfg.storage.data_path, codec.as_ref()) {
                Ok(count) => println!(
                    "Saved {} detections to {}.",
                    count,
                    cfg.storage.data_path.display()
                ),
                Err(e) => log::error!("save failed: {}", e),
            },
            "3" => match tracker.load(&cfg.storage.data_path, codec.as_ref()) {
                Ok(count) => println!(
                    "Loaded {} detections from {}.",
                    count,
                    cfg.storage.data_path.display()
                ),
                Err(e) => log::error!("load failed, log unchanged: {}", e),
            },
            "4" => print_counts(&tracker),
            "5" => {
                if let Some(value) = prompt_number(&mut lines, "Enter minimum area: ") {
                    if let Err(e) = tracker.set_min_area(value) {
                        println!("Rejected: {}", e);
                    }
                }
            }
            "6" => {
                if let Some(value) = prompt_number(&mut lines, "Enter maximum area: ") {
                    if let Err(e) = tracker.set_max_area(value) {
                        println!("Rejected: {}", e);
                    }
                }
            }
            "7" => break,
            other => println!("Invalid choice {:?}. Please select 1-7.", other),
        }
    }

    tracker.stop()?;
    Ok(())
}

fn print_menu() {
    println!("Space Debris Tracker Menu:");
    println!("1. Toggle Visualization");
    println!("2. Save Debris Data");
    println!("3. Load Debris Data");
    println!("4. Plot Debris Counts");
    println!("5. Set Min Area");
    println!("6. Set Max Area");
    println!("7. Exit");
    print!("Enter your choice (1-7): ");
    let _ = std::io::stdout().flush();
}

/// Textual counts-per-frame summary; stands in for the bar chart.
fn print_counts(tracker: &DebrisTracker) {
    let counts = tracker.log().counts_per_frame();
    if counts.is_empty() {
        println!("No detections recorded yet.");
        return;
    }
    println!("Frame | Debris Count");
    for (frame, count) in counts {
        println!("{:>5} | {:<5} {}", frame, count, "#".repeat(count.min(60)));
    }
}

fn prompt_number(
    lines: &mut impl Iterator<Item = std::io::Result<String>>,
    prompt: &str,
) -> Option<u32> {
    print!("{}", prompt);
    let _ = std::io::stdout().flush();
    let line = lines.next()?.ok()?;
    match line.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            println!("Not a number: {:?}", line.trim());
            None
        }
    }
}
