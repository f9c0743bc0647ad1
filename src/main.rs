use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use photocore::config::Config;
use photocore::db::coredb::TracingSink;
use photocore::db::{self, CoreDb};
use photocore::logging;

enum Command {
    Init,
    Check,
    Vacuum,
    Uuid,
    Roots,
    Albums,
    Tags,
    GetSetting(String),
    SetSetting(String, String),
}

struct Args {
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut positional = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("photocore {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                std::process::exit(1);
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let command = match parse_command(&positional) {
        Some(command) => command,
        None => {
            print_help();
            std::process::exit(1);
        }
    };

    Args { config_path, command }
}

fn parse_command(words: &[String]) -> Option<Command> {
    let (name, rest) = words.split_first()?;
    let command = match (name.as_str(), rest) {
        ("init", []) => Command::Init,
        ("check", []) => Command::Check,
        ("vacuum", []) => Command::Vacuum,
        ("uuid", []) => Command::Uuid,
        ("roots", []) => Command::Roots,
        ("albums", []) => Command::Albums,
        ("tags", []) => Command::Tags,
        ("get-setting", [key]) => Command::GetSetting(key.clone()),
        ("set-setting", [key, value]) => Command::SetSetting(key.clone(), value.clone()),
        _ => return None,
    };
    Some(command)
}

fn print_help() {
    println!(
        r#"photocore - photo library metadata store maintenance

USAGE:
    photocore [OPTIONS] <COMMAND>

COMMANDS:
    init                    Create the schema and default settings
    check                   Run the database integrity check
    vacuum                  Compact the database
    uuid                    Print the database UUID
    roots                   List album roots as JSON
    albums                  List albums as JSON
    tags                    List tags as JSON
    get-setting KEY         Print a stored setting
    set-setting KEY VALUE   Store a setting

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PHOTOCORE_LOG       Log filter (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/photocore/config.toml"#
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args();

    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let _ = logging::init(config.log_dir.clone());

    let engine = db::open(&config.database, &config.engine).context("opening database")?;
    let store = CoreDb::new(Arc::new(engine), Arc::new(TracingSink));
    store.initialize()?;

    match args.command {
        Command::Init => println!("Database ready"),
        Command::Check => {
            if !store.integrity_check() {
                bail!("integrity check failed");
            }
            println!("ok");
        }
        Command::Vacuum => {
            if !store.vacuum() {
                bail!("vacuum failed");
            }
        }
        Command::Uuid => println!("{}", store.database_uuid()),
        Command::Roots => print_json(&store.get_album_roots())?,
        Command::Albums => print_json(&store.scan_albums())?,
        Command::Tags => print_json(&store.scan_tags())?,
        Command::GetSetting(key) => match store.get_setting(&key) {
            Some(value) => println!("{}", value),
            None => bail!("setting {} is not set", key),
        },
        Command::SetSetting(key, value) => {
            if !store.set_setting(&key, &value) {
                bail!("could not store setting {}", key);
            }
        }
    }

    Ok(())
}
