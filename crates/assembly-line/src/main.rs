use assembly_line::{Cli, RunReport, logging};
use assembly_line_notify::format_build_time;
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.debug);

    match run(&cli).await {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            println!("{}", logging::error_annotation(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<RunReport> {
    cli.log_summary();
    let orchestrator = cli.orchestrator().await?;
    let report = orchestrator.execute().await.map_err(|e| {
        anyhow::anyhow!(e.user_message()).context(e.kind().summary())
    })?;
    Ok(report)
}

fn print_summary(report: &RunReport) {
    println!();
    println!("{}", "✓ Image Assembly Line 完了".green().bold());
    println!("  イメージ: {}", report.image.image_name.cyan());
    println!("  ID: {}", report.image.image_id);
    if report.pushed_tags.is_empty() {
        println!("  プッシュ: {}", "なし (no_push)".yellow());
    } else {
        println!("  プッシュ: {}", report.pushed_tags.join(", ").cyan());
    }
    println!("  所要時間: {}", format_build_time(report.elapsed));
}
