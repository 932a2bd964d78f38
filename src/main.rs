use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use yolo_curate::{
    clean_and_merge, convert_coco_dataset, fix_label_files, gather_images, run_scoring,
    split_dataset, Cli, Command, LabelDir, PredictionDir, Result,
};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Score(args) => {
            info!("Scoring predictions in {}...", args.predictions_dir.display());
            let labels = LabelDir::new(&args.labels_dir);
            let detector = PredictionDir::new(&args.predictions_dir);
            let report = run_scoring(&args, &labels, &detector)?;
            info!(
                "Done! Worst {} images saved in: {}",
                report.hardest.len(),
                args.hardest_dir().display()
            );
        }
        Command::Convert(args) => {
            info!("Starting COCO to YOLO conversion...");
            convert_coco_dataset(&args)?;
        }
        Command::Gather(args) => {
            info!("Gathering images listed in {}...", args.coco_json.display());
            gather_images(&args)?;
        }
        Command::Split(args) => {
            split_dataset(&args)?;
        }
        Command::FixLabels(args) => {
            for dir in &args.labels_dirs {
                info!("Fixing labels in {}...", dir.display());
                fix_label_files(dir, args.max_class_id)?;
            }
        }
        Command::Merge(args) => {
            clean_and_merge(&args)?;
        }
    }
    Ok(())
}
