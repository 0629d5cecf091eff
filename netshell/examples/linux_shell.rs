//! Linux shell example: negotiate a prompt, run a batch, upload a file.
//!
//! # Usage
//!
//! With password authentication:
//! ```bash
//! cargo run --example linux_shell -- --host localhost --user your_username --password your_password
//! ```
//!
//! With SSH key authentication:
//! ```bash
//! cargo run --example linux_shell -- --host localhost --user your_username --key ~/.ssh/id_ed25519
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use netshell::{DeviceType, SessionBuilder, SessionManager};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut builder = SessionBuilder::new(&args.host)
        .port(args.port)
        .username(&args.user)
        .device_type(DeviceType::Linux)
        .timeout(Duration::from_secs(args.timeout));

    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else if let Some(key_path) = &args.key {
        builder = builder.private_key_file(key_path, None);
    } else {
        eprintln!("Error: Must provide either --password or --key");
        std::process::exit(1);
    }

    let manager = SessionManager::default();

    println!("Connecting to {}:{}...", args.host, args.port);
    let id = manager
        .create_session(builder.build()?, Some("demo".to_string()))
        .await?;
    println!("Session '{}' ready", id);

    let info = manager.os_info(&id).await?;
    println!("\nHost:    {}", info.hostname);
    println!("Kernel:  {}", info.uname);
    println!("Release: {}", info.os_release.lines().next().unwrap_or("N/A"));

    let commands: Vec<String> = ["whoami", "pwd", "no-such-command", "uptime"]
        .iter()
        .map(|c| c.to_string())
        .collect();

    println!("\nRunning batch:");
    println!("{}", "-".repeat(50));
    for record in manager
        .exec_multi(&id, &commands, Duration::from_secs(10))
        .await?
    {
        match &record.error {
            Some(error) => println!("{:<18} ERROR {}", record.command, error),
            None => println!("{:<18} {}", record.command, record.output),
        }
    }
    println!("{}", "-".repeat(50));

    let path = "/tmp/netshell-demo.txt";
    let content = "written by netshell\nline with 'quotes' and $vars\n";
    let uploaded = manager.upload_text(&id, path, content).await?;
    println!("\nUploaded {} bytes to {}", uploaded.bytes, uploaded.path);

    let shown = manager
        .exec(&id, &format!("cat {}", path), Duration::from_secs(10))
        .await?;
    println!("{}", shown.output);

    manager.exec(&id, &format!("rm -f {}", path), Duration::from_secs(10)).await?;

    println!("\nClosing session...");
    manager.disconnect(&id).await?;
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
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = 22u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "root".to_string());
        let mut password = None;
        let mut key = None;
        let mut timeout = 30u64;

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => host = value.unwrap_or(host),
                "--port" | "-p" => port = value.and_then(|v| v.parse().ok()).unwrap_or(22),
                "--user" | "-u" => user = value.unwrap_or(user),
                "--password" | "-P" => password = value,
                "--key" | "-k" => key = value.map(PathBuf::from),
                "--timeout" | "-t" => timeout = value.and_then(|v| v.parse().ok()).unwrap_or(30),
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        Self {
            host,
            port,
            user,
            password,
            key,
            timeout,
        }
    }

    fn print_help() {
        println!(
            r#"netshell linux_shell example

USAGE:
    cargo run --example linux_shell -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target host [default: localhost]
    -p, --port <PORT>        SSH port [default: 22]
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password for authentication
    -k, --key <PATH>         Path to SSH private key
    -t, --timeout <SECS>     Connection timeout [default: 30]
    --help                   Print this help message
"#
        );
    }
}
