//! Train a small cascade on synthetic 8x8 windows and report its accuracy.
//!
//! Positives have a bright top half; negatives are a mix of flat, inverted
//! and textured windows. Set `HAAR_CASCADE_LOG=debug` to see every round.

use haar_cascade::core::{Cascade, IntegralGrid, PixelGrid};
use haar_cascade::train::{LogObserver, StopReason};
use haar_cascade::{evaluate_cascade, Trainer, TrainerParams};

#[cfg(feature = "tracing")]
use haar_cascade::core::init_tracing;
#[cfg(not(feature = "tracing"))]
use haar_cascade::core::init_from_env;
#[cfg(not(feature = "tracing"))]
use log::LevelFilter;
#[cfg(feature = "tracing")]
use tracing_log::LogTracer;

const WINDOW: usize = 8;

fn window(f: impl FnMut(usize, usize) -> u8) -> Result<IntegralGrid, Box<dyn std::error::Error>> {
    Ok(IntegralGrid::from(&PixelGrid::from_fn(WINDOW, WINDOW, f)?))
}

fn positives() -> Result<Vec<IntegralGrid>, Box<dyn std::error::Error>> {
    (0..24)
        .map(|k| {
            window(|x, y| {
                let tex = ((x * 5 + y * 3 + k * 7) % 30) as u8;
                if y < WINDOW / 2 {
                    190 + tex
                } else {
                    40 + tex
                }
            })
        })
        .collect()
}

fn negatives() -> Result<Vec<IntegralGrid>, Box<dyn std::error::Error>> {
    (0..48)
        .map(|k| match k % 3 {
            0 => window(|_, _| (k * 5) as u8),
            1 => window(|x, y| if y < WINDOW / 2 { 40 + x as u8 } else { 190 + y as u8 }),
            _ => window(|x, y| ((x * 41 + y * 73 + k * 29) % 256) as u8),
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "tracing")]
    {
        LogTracer::init()?;
        init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    init_from_env(LevelFilter::Info)?;

    let positives = positives()?;
    let negatives = negatives()?;

    let params = TrainerParams {
        rounds_per_stage: 4,
        max_stages: 8,
        ..TrainerParams::for_window(WINDOW)
    };
    let trainer = Trainer::new(params)?;
    let report = trainer.train_cascade_report(&positives, &negatives, &mut LogObserver)?;
    if report.stop_reason == StopReason::StageLimit {
        println!("stage limit reached before the false-positive target");
    }

    let path = std::env::temp_dir().join("haar_cascade_toy.txt");
    report.cascade.write_text_file(&path)?;
    let reloaded = Cascade::read_text_file(&path)?;

    let eval = evaluate_cascade(&reloaded, &positives, &negatives)?;
    println!(
        "{} stages, {} weak rules -> {}",
        reloaded.len(),
        reloaded.weak_rule_count(),
        path.display()
    );
    println!(
        "detection {:.3}, false positives {:.3}, rejections per stage {:?}",
        eval.detection_rate, eval.false_positive_rate, eval.negative_rejections
    );
    Ok(())
}
