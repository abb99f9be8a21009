use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vocab_quiz::{config, db::banks::bank_name_from_file_name, QuizEngine};

const USAGE: &str = "usage: vocab-quiz <list | import <file> [name] | remove <name> | sweep>";

fn main() -> ExitCode {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vocab_quiz=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = config::load_engine_config();
  let engine = match QuizEngine::open(&config) {
    Ok(engine) => engine,
    Err(e) => {
      tracing::error!("Failed to open quiz storage in {}: {}", config.data_dir.display(), e);
      return ExitCode::FAILURE;
    }
  };

  let args: Vec<String> = std::env::args().skip(1).collect();
  let args: Vec<&str> = args.iter().map(String::as_str).collect();

  match args.as_slice() {
    ["list"] => {
      let banks = engine.list_banks();
      if banks.is_empty() {
        println!("No banks available");
      }
      for (name, size) in banks {
        println!("{}\t{}", name, size);
      }
    }
    ["import", file, rest @ ..] if rest.len() <= 1 => {
      let name = match rest.first().map(|s| s.to_string()).or_else(|| bank_name_from_file_name(file)) {
        Some(name) => name,
        None => {
          eprintln!("Could not derive a bank name from {}", file);
          return ExitCode::FAILURE;
        }
      };
      let bytes = match std::fs::read(Path::new(file)) {
        Ok(bytes) => bytes,
        Err(e) => {
          eprintln!("Failed to read {}: {}", file, e);
          return ExitCode::FAILURE;
        }
      };
      match engine.import_bank_source(&name, &bytes) {
        Ok(count) => println!("Bank {} loaded with {} question(s)", name, count),
        Err(e) => {
          tracing::warn!("Import of {} failed: {}", name, e);
          eprintln!("{}", e.user_message());
          return ExitCode::FAILURE;
        }
      }
    }
    ["remove", name] => {
      if let Err(e) = engine.remove_bank(name) {
        eprintln!("{}", e.user_message());
        return ExitCode::FAILURE;
      }
      println!("Bank {} removed", name);
    }
    ["sweep"] => {
      let removed = engine.sweep_expired();
      println!("Removed {} expired record(s)", removed);
    }
    _ => {
      eprintln!("{}", USAGE);
      return ExitCode::FAILURE;
    }
  }

  ExitCode::SUCCESS
}
