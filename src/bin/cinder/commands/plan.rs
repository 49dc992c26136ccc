//! `cinder plan` command

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::PlanArgs;
use cinder::builder::graph::CommandSummary;
use cinder::util::fs::{normalize_path, relative_path};

#[derive(Serialize)]
struct SourceEntry {
    path: String,
    state: String,
    object: Option<String>,
}

#[derive(Serialize)]
struct Plan {
    target: String,
    sources: Vec<SourceEntry>,
    commands: Vec<CommandSummary>,
}

pub fn execute(args: PlanArgs) -> Result<()> {
    let dir = std::fs::canonicalize(&args.dir)
        .with_context(|| format!("source directory not found: {}", args.dir.display()))?;
    let name = match args.name {
        Some(name) => name,
        None => dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string()),
    };
    let out = args.out.unwrap_or_else(|| dir.join(".cinder").join("build"));

    let mut solution = super::detected_solution(&dir, args.arch.as_deref())?;
    let target = solution.add_target(&name, args.kind.into(), &dir, &out)?;

    let storage = target.storage_mut();
    storage.postpone();
    storage.add_pattern(".", &args.pattern, !args.no_recursive)?;
    if let Some(exclude) = &args.exclude {
        storage.remove_pattern(".", exclude, !args.no_recursive)?;
    }

    solution.resolve_targets()?;
    let graph = solution.command_graph()?;

    let sources = solution
        .target(&name)
        .map(|t| {
            t.storage()
                .iter()
                .map(|f| SourceEntry {
                    path: normalize_path(&relative_path(&dir, f.file())),
                    state: format!("{:?}", f.state()),
                    object: f.object_file().map(normalize_path),
                })
                .collect()
        })
        .unwrap_or_default();

    let plan = Plan {
        target: name,
        sources,
        commands: graph.summaries()?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("Target '{}':", plan.target);
    println!();
    println!("Sources:");
    for source in &plan.sources {
        println!("  {:<32} {}", source.path, source.state);
    }
    println!();

    if plan.commands.is_empty() {
        println!("No commands (no compiler handles these sources)");
        return Ok(());
    }

    println!("Commands:");
    for cmd in &plan.commands {
        println!("  {}. {} {}", cmd.id + 1, cmd.program, cmd.args.join(" "));
        if !cmd.depends_on.is_empty() {
            let deps: Vec<String> = cmd.depends_on.iter().map(|d| (d + 1).to_string()).collect();
            println!("     after: {}", deps.join(", "));
        }
    }

    Ok(())
}
