use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hybrid_classifier::{AdapterConfig, Handler, HandlerBuilder, Input, PaddingStrategy, Task};
use log::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a Hugging Face tokenizer.json
    #[arg(short, long)]
    tokenizer: PathBuf,

    /// Path to the label mapping JSON ({"0": "label", ...} or a config with id2label)
    #[arg(short, long)]
    labels: PathBuf,

    /// Model task the adapter is built for
    #[arg(long, default_value = "text_classification")]
    task: Task,

    /// Maximum sequence length, special tokens included
    #[arg(long, default_value_t = hybrid_classifier::config::DEFAULT_MAX_LENGTH)]
    max_length: usize,

    /// Pad every sequence to --max-length
    #[arg(long)]
    pad_to_max_length: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tokenize text into [input_ids, attention_mask]
    Preprocess {
        /// Text to tokenize
        text: String,
        /// Write the .npz payload here instead of printing the arrays
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Turn a saved score tensor (.npz or .npy) into labels
    Postprocess {
        scores: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let start_time = Instant::now();

    let padding = if args.pad_to_max_length {
        PaddingStrategy::MaxLength
    } else {
        PaddingStrategy::Longest
    };
    let labels_json = fs::read_to_string(&args.labels)
        .with_context(|| format!("Failed to read label mapping {:?}", args.labels))?;

    let handler = HandlerBuilder::new()
        .with_config(AdapterConfig::default().with_max_length(args.max_length).with_padding(padding))
        .with_tokenizer_file(&args.tokenizer)?
        .with_labels_json(&labels_json)?
        .build(args.task)?;
    info!("Handler for {} ready (took {:.2?})", handler.task(), start_time.elapsed());

    match args.command {
        Command::Preprocess { text, out } => {
            let output = handler.preprocess(&Input::from_text(text))?;
            match out {
                Some(path) => {
                    let body = output.body().unwrap_or_default();
                    fs::write(&path, body).with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Wrote {} bytes to {}", body.len(), path.display());
                }
                None => {
                    for (name, array) in ["input_ids", "attention_mask"]
                        .iter()
                        .zip(output.into_input().get_as_numpy(None)?)
                    {
                        println!("{}: {:?}", name, array);
                    }
                }
            }
        }
        Command::Postprocess { scores } => {
            let bytes = fs::read(&scores).with_context(|| format!("Failed to read scores {:?}", scores))?;
            let output = handler.postprocess(&Input::from_bytes(bytes))?;
            println!("{}", String::from_utf8_lossy(output.body().unwrap_or_default()));
        }
    }

    info!("Done in {:.2?}", start_time.elapsed());
    Ok(())
}
