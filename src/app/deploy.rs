use crate::adapters::http::HttpBackendClient;
use crate::adapters::prompt::TerminalPrompt;
use crate::config::{DeployArgs, ProjectContext, Settings};
use crate::core::orchestrator::{DeployReport, Orchestrator, Submission};
use crate::core::steps::StepRegistry;
use crate::core::template::TemplateRenderer;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use std::io::{self, Write};

/// `flowdeploy` 主流程：載入設定與專案、執行編排，回傳報告
pub async fn run(args: &DeployArgs) -> Result<DeployReport> {
    args.validate()?;

    let settings = Settings::load(&args.project_dir, args.settings.as_deref())?;
    let project = ProjectContext::load(&args.project_dir)?;
    let request = args.selection_request()?;

    if args.verbose {
        tracing::debug!("Settings: {:?}", settings);
        tracing::debug!("Selection request: {:?}", request);
    }

    let backend = HttpBackendClient::from_settings(&settings.api)?;
    let registry = StepRegistry::with_builtins();
    let renderer = TemplateRenderer::new(settings.templating.block_namespace.clone());
    let mut prompt = TerminalPrompt::new(settings.prompts.interactive && !args.no_prompt);

    let orchestrator = Orchestrator::new(&project, &backend, &registry)
        .with_renderer(renderer)
        .with_dry_run(args.dry_run);

    orchestrator.run(&request, &mut prompt).await
}

/// 成功結果與 not found 清單寫到 `out`，警告與失敗寫到 `err`
pub fn write_report<O: Write, E: Write>(report: &DeployReport, out: &mut O, err: &mut E) -> io::Result<()> {
    for warning in &report.warnings {
        writeln!(err, "⚠️ {}", warning)?;
    }

    if !report.not_found.is_empty() {
        writeln!(
            out,
            "The following deployment(s) could not be found and will not be deployed: {}",
            report.not_found.join(", ")
        )?;
    }

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(Submission::Created(stored)) => {
                let pool = &stored.definition.work_pool_name;
                writeln!(
                    out,
                    "Deployment '{}' successfully created with id '{}'.",
                    stored.definition.qualified_name(),
                    stored.id
                )?;
                writeln!(
                    out,
                    "\nTo execute flow runs from this deployment, start a worker that pulls work from the '{}' work pool:",
                    pool
                )?;
                writeln!(out, "$ flowdeploy worker start --pool '{}'\n", pool)?;
            }
            Ok(Submission::DryRun(definition)) => {
                let rendered = serde_json::to_string_pretty(definition).map_err(io::Error::other)?;
                writeln!(out, "📦 Dry run for '{}':", definition.qualified_name())?;
                writeln!(out, "{}", rendered)?;
            }
            Err(e) => {
                writeln!(err, "❌ Deployment '{}' failed: {}", outcome.name, e.user_friendly_message())?;
                writeln!(err, "💡 {}", e.recovery_suggestion())?;
            }
        }
    }

    Ok(())
}
