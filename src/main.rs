use anyhow::Context;
use clap::Parser;
use flow_deploy::app::deploy;
use flow_deploy::utils::logger;
use flow_deploy::DeployArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = DeployArgs::parse();

    // 初始化日誌
    if args.log_json {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting flowdeploy");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let report = match deploy::run(&args).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(
                "❌ Deploy failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    deploy::write_report(&report, &mut std::io::stdout().lock(), &mut std::io::stderr().lock())
        .context("failed to write the deploy report")?;

    tracing::info!("📊 Execution summary: {:?}", report.get_execution_summary());

    let exit_code = report.exit_code();
    if exit_code > 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}
