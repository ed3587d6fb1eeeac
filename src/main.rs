use std::path::PathBuf;
use trackdeck::config::{AppConfig, CliArgs};

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    let config = AppConfig::from_args(args);
    trackdeck::logging::init(&config.log_file, &config.log_filter)?;
    trackdeck::app::run(&config)
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--null-audio" => out.null_audio = true,
            "--player" => out.player = true,
            flag @ ("--catalog" | "--log-file") => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("{flag} requires a path");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("{flag} cannot be empty");
                }
                let path = Some(PathBuf::from(value.trim()));
                if flag == "--catalog" {
                    out.catalog = path;
                } else {
                    out.log_file = path;
                }
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("trackdeck");
    println!("  --catalog PATH    Load tracks from a JSON catalog");
    println!("  --null-audio      Run without an audio output device");
    println!("  --player          Start on the player page");
    println!("  --log-file PATH   Write logs to PATH");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parses_flags_and_paths() {
        let parsed = parse_args(args(&[
            "--catalog",
            "songs.json",
            "--null-audio",
            "--player",
            "--log-file",
            "/tmp/td.log",
        ]))
        .expect("args");
        assert_eq!(parsed.catalog, Some(PathBuf::from("songs.json")));
        assert_eq!(parsed.log_file, Some(PathBuf::from("/tmp/td.log")));
        assert!(parsed.null_audio);
        assert!(parsed.player);
    }

    #[test]
    fn rejects_missing_value_and_unknown_flags() {
        assert!(parse_args(args(&["--catalog"])).is_err());
        assert!(parse_args(args(&["--catalog", " "])).is_err());
        assert!(parse_args(args(&["--volume"])).is_err());
    }
}
