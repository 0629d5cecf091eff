//! Nokia SR OS example: operational commands and a configuration transaction.
//!
//! Enters exclusive configuration mode, applies a few commands, and either
//! commits or discards them. Pass `--commit` to actually commit.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example sros_configure -- --host pe1 --user admin --password admin
//! cargo run --example sros_configure -- --host pe1 --user admin --password admin --commit
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use netshell::{DeviceType, Session, SessionBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!("=== Netshell Nokia SR OS Example ===\n");
    println!("Connecting to {}:{}...", args.host, args.port);

    let mut builder = SessionBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .device_type(DeviceType::Sros)
        .timeout(Duration::from_secs(args.timeout));

    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key_file(key_path, None);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    let session = Session::connect(builder.build()?).await?;
    println!("Connected!\n");

    println!("--- show version ---");
    let response = session.cli("show version", Duration::from_secs(30)).await?;
    println!("{}\n", response.result);

    println!("--- present working context ---");
    println!("{}\n", session.get_context().await?);

    let commands = vec![
        r#"router "Base" interface "netshell-demo" description "managed by netshell""#.to_string(),
        r#"router "Base" interface "netshell-demo" admin-state disable"#.to_string(),
    ];

    println!(
        "--- configure ({}) ---",
        if args.commit { "commit" } else { "discard" }
    );
    let result = session.configure(&commands, args.commit).await?;
    for step in &result.steps {
        let status = if step.is_ok() { "ok" } else { "FAILED" };
        println!("[{:<6}] {}", status, step.command);
        if !step.output.is_empty() {
            println!("         {}", step.output.replace('\n', "\n         "));
        }
        if let Some(error) = &step.error {
            println!("         {}", error);
        }
    }
    println!("\ncommitted: {}", result.committed);

    session.close().await?;
    println!("Done!");

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    timeout: u64,
    commit: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            port: 22,
            user: "admin".to_string(),
            password: None,
            key: None,
            timeout: 30,
            commit: false,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--commit" => {
                    parsed.commit = true;
                    i += 1;
                    continue;
                }
                "--help" => {
                    println!(
                        "USAGE:\n    cargo run --example sros_configure -- --host <HOST> \
                         --user <USER> (--password <PASS> | --key <PATH>) [--port <PORT>] \
                         [--timeout <SECS>] [--commit]"
                    );
                    std::process::exit(0);
                }
                "--host" | "-h" => parsed.host = value.unwrap_or(parsed.host),
                "--port" | "-p" => parsed.port = value.and_then(|v| v.parse().ok()).unwrap_or(22),
                "--user" | "-u" => parsed.user = value.unwrap_or(parsed.user),
                "--password" | "-P" => parsed.password = value,
                "--key" | "-k" => parsed.key = value.map(PathBuf::from),
                "--timeout" | "-t" => {
                    parsed.timeout = value.and_then(|v| v.parse().ok()).unwrap_or(30)
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        parsed
    }
}
