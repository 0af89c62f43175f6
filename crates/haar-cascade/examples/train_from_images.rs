use haar_cascade::core::init_from_env;
use haar_cascade::samples::load_window_samples;
use haar_cascade::{evaluate_cascade, Trainer, TrainerParams};
use log::LevelFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_from_env(LevelFilter::Info)?;

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: train_from_images <positive_dir> <negative_dir> <out_cascade> [params.json]");
        return Ok(());
    }

    let params = match args.get(4) {
        Some(path) => TrainerParams::load_json(path)?,
        None => TrainerParams {
            rounds_per_stage: 20,
            ..TrainerParams::default()
        },
    };

    let positives = load_window_samples(&args[1], params.window_size)?;
    let negatives = load_window_samples(&args[2], params.window_size)?;

    let cascade = Trainer::new(params)?.train_cascade(&positives, &negatives)?;
    cascade.write_text_file(&args[3])?;

    let eval = evaluate_cascade(&cascade, &positives, &negatives)?;
    println!(
        "cascade written to {} (training detection {:.3}, false positives {:.3})",
        args[3], eval.detection_rate, eval.false_positive_rate
    );
    Ok(())
}
