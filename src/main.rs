//! Minimal demonstration binary. Not a real CLI - just enough to exercise
//! an [`ExpiringStore`] from the shell while poking at a data directory.
//!
//! ```text
//! shortkv <data-dir> put <url|paste> <value> <length> <ttl-secs>
//! shortkv <data-dir> get <key>
//! ```

use shortkv::config::ExpiringConfigBuilder;
use shortkv::{ExpiringStore, ValueKind};
use std::env;
use std::process::ExitCode;

fn usage() -> ! {
    eprintln!("usage:");
    eprintln!("  shortkv <data-dir> put <url|paste> <value> <length> <ttl-secs>");
    eprintln!("  shortkv <data-dir> get <key>");
    std::process::exit(2);
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage();
    }

    let data_dir = &args[1];
    let command = args[2].as_str();

    let config = match ExpiringConfigBuilder::new(data_dir).build() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let store = ExpiringStore::open(config);

    match command {
        "put" => {
            if args.len() != 7 {
                usage();
            }
            let kind = match args[3].as_str() {
                "url" => ValueKind::Url,
                "paste" => ValueKind::Paste,
                other => {
                    eprintln!("unknown kind {other:?}, expected \"url\" or \"paste\"");
                    return ExitCode::FAILURE;
                }
            };
            let value = args[4].clone();
            let length: usize = match args[5].parse() {
                Ok(n) => n,
                Err(_) => {
                    eprintln!("length must be an integer");
                    return ExitCode::FAILURE;
                }
            };
            let ttl_secs: i64 = match args[6].parse() {
                Ok(n) => n,
                Err(_) => {
                    eprintln!("ttl-secs must be an integer");
                    return ExitCode::FAILURE;
                }
            };
            match store.put(value, kind, length, ttl_secs) {
                Ok(id) => {
                    println!("{id}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("put failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        "get" => {
            if args.len() != 4 {
                usage();
            }
            match store.get(&args[3]) {
                Ok((value, kind)) => {
                    println!("{kind:?}\t{value}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("get failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        other => {
            eprintln!("unknown command {other:?}");
            usage();
        }
    }
}
