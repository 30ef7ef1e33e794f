//! Command implementations

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use vidsup::adapters::toml_config::serialize_config;
use vidsup::utils::Utils;
use vidsup::{
    OpaqueCall, OperationPort, OperationResult, OperationSupervisor, ProcessSpec, SupervisorConfig,
    WorkKind,
};

use crate::cli::args::{ConfigArgs, CopyArgs, ExecArgs};

/// Execute the exec command
pub async fn exec(supervisor: &OperationSupervisor, args: ExecArgs) -> Result<OperationResult> {
    let label = match args.label {
        Some(label) => label,
        None => args
            .command
            .first()
            .map(|program| display_name(Path::new(program)))
            .unwrap_or_default(),
    };
    let spec = ProcessSpec::from_argv(label, args.command, &args.output)
        .context("Invalid command to execute")?;

    info!("Executing: {} {}", spec.program, spec.args.join(" "));
    info!("Output: {}", spec.output.display());

    let outcome = supervisor.run(WorkKind::Process(spec)).await;
    println!("{}", render_outcome(&outcome, args.json)?);
    Ok(outcome)
}

/// Execute the copy command
pub async fn copy(supervisor: &OperationSupervisor, args: CopyArgs) -> Result<OperationResult> {
    if !args.input.is_file() {
        return Err(anyhow::anyhow!(
            "Input file does not exist: {}",
            args.input.display()
        ));
    }

    info!("Input: {}", args.input.display());
    info!("Output: {}", args.output.display());

    let label = format!("Copy {}", display_name(&args.input));
    let input = args.input.clone();
    let output = args.output.clone();
    let call = OpaqueCall::new(label, move || {
        std::fs::copy(&input, &output).with_context(|| {
            format!("Failed to copy {} to {}", input.display(), output.display())
        })?;
        Ok(output)
    });

    let outcome = supervisor.run(WorkKind::Opaque(call)).await;
    println!("{}", render_outcome(&outcome, args.json)?);
    Ok(outcome)
}

/// Execute the config command
pub fn config(config: &SupervisorConfig, args: ConfigArgs) -> Result<()> {
    let rendered = if args.json {
        serde_json::to_string_pretty(config).context("Failed to serialize configuration")?
    } else {
        serialize_config(config)?
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

/// One-line human summary of an outcome, or its JSON form
pub fn render_outcome(outcome: &OperationResult, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string(outcome).context("Failed to serialize outcome");
    }

    Ok(match outcome {
        OperationResult::Completed { output, size } => format!(
            "Completed: {} ({})",
            output.display(),
            Utils::format_file_size(*size)
        ),
        OperationResult::Failed { reason, .. } => format!("Failed: {}", reason),
        OperationResult::Cancelled => "Cancelled by user".to_string(),
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
