//! `cinder toolchains` command

use anyhow::Result;
use serde::Serialize;

use crate::cli::ToolchainsArgs;
use cinder::builder::Program;
use cinder::core::PackageId;

#[derive(Serialize)]
struct ProgramEntry {
    id: PackageId,
    vendor: String,
    path: String,
    /// Toolchain-supplied options
    system: Vec<String>,
}

#[derive(Serialize)]
struct ToolchainReport {
    host_arch: String,
    target_arch: String,
    programs: Vec<ProgramEntry>,
    extensions: Vec<(String, PackageId)>,
}

pub fn execute(args: ToolchainsArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let solution = super::detected_solution(&cwd, args.arch.as_deref())?;
    let registry = solution.registry();

    let report = ToolchainReport {
        host_arch: solution.settings().host_arch.clone(),
        target_arch: solution.settings().target_arch.clone(),
        programs: registry
            .programs()
            .into_iter()
            .map(|(id, program)| {
                let options = program
                    .as_compiler()
                    .map(|c| c.options())
                    .or_else(|| program.as_linker().map(|l| l.options()));
                ProgramEntry {
                    id,
                    vendor: program.vendor().to_string(),
                    path: program.path().display().to_string(),
                    system: options.map(|o| o.render_system()).unwrap_or_default(),
                }
            })
            .collect(),
        extensions: registry.active_extensions().into_iter().collect(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Host:   {}", report.host_arch);
    println!("Target: {}", report.target_arch);
    println!();

    if report.programs.is_empty() {
        println!("No programs detected");
        return Ok(());
    }

    println!("Programs:");
    for p in &report.programs {
        println!("  {:<40} {:<8} {}", p.id.to_string(), p.vendor, p.path);
        if !p.system.is_empty() {
            println!("  {:<40} {}", "", p.system.join(" "));
        }
    }
    println!();

    println!("Extensions:");
    for (ext, id) in &report.extensions {
        println!("  {:<8} {}", ext, id);
    }

    Ok(())
}
