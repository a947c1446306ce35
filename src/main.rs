use anyhow::Result;
use clap::Parser;
use ssh_remote::{cli::{Action, Cli}, config::Config, run_job, Outcome};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let streamed = matches!(cli.command, Action::Exec { stream: true, .. });
    let config = Config::from_cli(&cli)?;
    let targets: Vec<_> = config.targets.iter().map(|t| t.name.clone()).collect();
    log::info!("Targets: {}", targets.join(", "));

    let mut failed = 0;
    for report in run_job(config) {
        match report.result {
            Ok(Outcome::Exec { outputs, exit_code }) => {
                println!("== {}", report.target);
                // 流式输出已经逐行打印
                for output in outputs.iter().filter(|_| !streamed) {
                    print!("{}", output);
                    if !output.is_empty() && !output.ends_with('\n') {
                        println!();
                    }
                }
                match exit_code {
                    Some(code) => println!("-- exit code: {}", code),
                    None => println!("-- exit code: unavailable"),
                }
            }
            Ok(Outcome::Put { bytes }) => {
                println!("✅ {}: wrote {} bytes", report.target, bytes);
            }
            Ok(Outcome::Upload { verified }) => {
                if verified {
                    println!("✅ {}: upload completed and verified", report.target);
                } else {
                    println!("✅ {}: upload completed", report.target);
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("❌ {}: {:#}", report.target, e);
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
