//! CLI subcommands: synth, validate, plan, init, status, drift, schema, completion.

use crate::app::{self, App};
use crate::core::error::{MusabiError, Result};
use crate::core::types::{ExecutionPlan, PlanAction, ProvenanceEvent, StackConfig};
use crate::core::{parser, planner, resolver, schedule, state, synth};
use crate::stacks::musabi;
use crate::tripwire::{drift, eventlog};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "musabi",
    version,
    about = "Synthesize the musabi stack: an image registry and a daily scheduled container task"
)]
pub struct Cli {
    /// Log progress at info level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synthesize the stack into a cloud assembly
    Synth {
        /// Path to musabi.yaml (default: built-in declaration)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Cloud assembly output directory
        #[arg(short, long, env = "MUSABI_OUTDIR", default_value = "cdk.out")]
        outdir: PathBuf,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Print the template instead of writing the assembly
        #[arg(long)]
        stdout: bool,
    },

    /// Validate a declaration without synthesizing
    Validate {
        /// Path to musabi.yaml (default: built-in declaration)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show what changed since the last synth
    Plan {
        /// Path to musabi.yaml (default: built-in declaration)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,
    },

    /// Write the built-in declaration as musabi.yaml
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show lock state of synthesized stacks
    Status {
        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,
    },

    /// Detect hand edits of written templates (tripwire)
    Drift {
        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Exit non-zero on any drift (for CI/cron)
        #[arg(long)]
        tripwire: bool,
    },

    /// Print the JSON Schema of musabi.yaml
    Schema,

    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Assembly directory when no subcommand is given: `MUSABI_OUTDIR` or `cdk.out`.
fn default_outdir() -> PathBuf {
    std::env::var_os("MUSABI_OUTDIR")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("cdk.out"))
}

impl Default for Commands {
    fn default() -> Self {
        Self::Synth {
            file: None,
            outdir: default_outdir(),
            state_dir: PathBuf::from("state"),
            stdout: false,
        }
    }
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Synth {
            file,
            outdir,
            state_dir,
            stdout,
        } => cmd_synth(file.as_deref(), &outdir, &state_dir, stdout),
        Commands::Validate { file } => cmd_validate(file.as_deref()),
        Commands::Plan { file, state_dir } => cmd_plan(file.as_deref(), &state_dir),
        Commands::Init { path } => cmd_init(&path),
        Commands::Status { state_dir } => cmd_status(&state_dir),
        Commands::Drift {
            state_dir,
            tripwire,
        } => cmd_drift(&state_dir, tripwire),
        Commands::Schema => cmd_schema(),
        Commands::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "musabi", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Load a declaration (or the built-in one) and report every violation.
fn load_config(file: Option<&Path>) -> Result<StackConfig> {
    let config = match file {
        Some(path) => parser::parse_config_file(path)?,
        None => musabi::config(),
    };
    let errors = parser::validate_config(&config);
    if errors.is_empty() {
        return Ok(config);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err(MusabiError::Validation(
        errors.into_iter().map(|e| e.message).collect(),
    ))
}

fn cmd_synth(file: Option<&Path>, outdir: &Path, state_dir: &Path, stdout: bool) -> Result<()> {
    let config = load_config(file)?;

    if stdout {
        let template = synth::synthesize(&config)?;
        print!("{}", app::render_template(&template)?);
        return Ok(());
    }

    let started = Instant::now();
    let run_id = eventlog::generate_run_id();
    let tripwire = config.policy.tripwire;
    if tripwire {
        eventlog::append_event(
            state_dir,
            &config.stack,
            ProvenanceEvent::SynthStarted {
                stack: config.stack.clone(),
                run_id: run_id.clone(),
                musabi_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        )?;
    }

    let mut app = App::new();
    app.add_stack(config.clone());
    let outputs = match app.synth(outdir) {
        Ok(outputs) => outputs,
        Err(e) => {
            if tripwire {
                eventlog::append_event(
                    state_dir,
                    &config.stack,
                    ProvenanceEvent::SynthFailed {
                        stack: config.stack.clone(),
                        run_id: run_id.clone(),
                        error: e.to_string(),
                    },
                )?;
            }
            return Err(e);
        }
    };

    for out in &outputs {
        let hashes = planner::resource_hashes(&out.template);
        if tripwire {
            for (logical_id, rl) in &hashes {
                eventlog::append_event(
                    state_dir,
                    &out.stack,
                    ProvenanceEvent::ResourceSynthesized {
                        stack: out.stack.clone(),
                        logical_id: logical_id.clone(),
                        resource_type: rl.resource_type.clone(),
                        hash: rl.hash.clone(),
                    },
                )?;
            }
            eventlog::append_event(
                state_dir,
                &out.stack,
                ProvenanceEvent::SynthCompleted {
                    stack: out.stack.clone(),
                    run_id: run_id.clone(),
                    resources: u32::try_from(hashes.len()).unwrap_or(u32::MAX),
                    template_hash: out.template_hash.clone(),
                    total_seconds: started.elapsed().as_secs_f64(),
                },
            )?;
        }
        let resource_count = hashes.len();
        if config.policy.lock_file {
            let lock = state::new_lock(
                &out.stack,
                &out.template_path.display().to_string(),
                &out.template_hash,
                hashes,
            );
            let path = state::save_lock(state_dir, &lock)?;
            tracing::info!(stack = %out.stack, path = %path.display(), "lock saved");
        }

        println!(
            "Synthesized {} ({} resources) -> {}",
            out.stack,
            resource_count,
            out.template_path.display()
        );
    }
    println!("  Schedule: {}", schedule::describe(&config.task.schedule)?);
    tracing::info!(
        run_id = %run_id,
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "synth finished"
    );
    Ok(())
}

fn cmd_validate(file: Option<&Path>) -> Result<()> {
    let config = load_config(file)?;
    println!(
        "OK: {} ({}, {} secret(s), {} cpu / {} MiB)",
        config.stack,
        schedule::describe(&config.task.schedule)?,
        config.task.image.secrets.len(),
        config.task.image.cpu,
        config.task.image.memory_limit_mib
    );
    Ok(())
}

/// Synthesize and diff against the stack's lock, if any.
fn compute_plan(file: Option<&Path>, state_dir: &Path) -> Result<ExecutionPlan> {
    let config = load_config(file)?;
    let template = synth::synthesize(&config)?;
    let order = resolver::build_execution_order(&template)?;
    let lock = state::load_lock(state_dir, &config.stack)?;
    Ok(planner::plan(&template, &config.stack, &order, lock.as_ref()))
}

fn cmd_plan(file: Option<&Path>, state_dir: &Path) -> Result<()> {
    let plan = compute_plan(file, state_dir)?;
    tracing::info!(
        stack = %plan.stack,
        create = plan.to_create,
        update = plan.to_update,
        destroy = plan.to_destroy,
        "plan computed"
    );
    print_plan(&plan);
    Ok(())
}

/// Display a plan to stdout.
fn print_plan(plan: &ExecutionPlan) {
    println!("Planning: {} ({} resources)", plan.stack, plan.changes.len());
    println!();
    for change in &plan.changes {
        let symbol = match change.action {
            PlanAction::Create => "+",
            PlanAction::Update => "~",
            PlanAction::Destroy => "-",
            PlanAction::NoOp => " ",
        };
        println!("  {} {}", symbol, change.description);
    }
    println!();
    println!(
        "Plan: {} to add, {} to change, {} to destroy, {} unchanged.",
        plan.to_create, plan.to_update, plan.to_destroy, plan.unchanged
    );
}

fn cmd_init(path: &Path) -> Result<()> {
    let config_path = path.join("musabi.yaml");
    if config_path.exists() {
        return Err(MusabiError::Exists(config_path.display().to_string()));
    }

    let state_dir = path.join("state");
    std::fs::create_dir_all(&state_dir)?;
    let yaml = serde_yaml_ng::to_string(&musabi::config())?;
    std::fs::write(&config_path, yaml)?;

    println!("Initialized musabi project at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Created: {}/", state_dir.display());
    Ok(())
}

/// Stack names with a directory under `state_dir`, sorted.
fn state_stacks(state_dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(state_dir).map_err(|source| MusabiError::Read {
        path: state_dir.display().to_string(),
        source,
    })?;
    let mut names: Vec<String> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    Ok(names)
}

fn cmd_status(state_dir: &Path) -> Result<()> {
    let mut found = false;
    for name in state_stacks(state_dir)? {
        let Some(lock) = state::load_lock(state_dir, &name)? else {
            continue;
        };
        found = true;
        println!("Stack: {}", lock.stack);
        println!("  Generated: {}", lock.generated_at);
        println!("  Generator: {}", lock.generator);
        println!("  Template:  {} ({})", lock.template_file, lock.template_hash);
        println!("  Resources: {}", lock.resources.len());
        for (id, rl) in &lock.resources {
            println!("    {} [{}]", id, rl.resource_type);
        }

        let events = eventlog::read_events(state_dir, &name)?;
        let last_run = events.iter().rev().find_map(|e| match &e.event {
            ProvenanceEvent::SynthCompleted {
                run_id,
                total_seconds,
                ..
            } => Some((e.ts.as_str(), run_id.as_str(), *total_seconds)),
            _ => None,
        });
        if let Some((ts, run_id, secs)) = last_run {
            println!("  Last run:  {} at {} ({:.3}s)", run_id, ts, secs);
        }
        println!();
    }

    if !found {
        println!("No state found. Run `musabi synth` first.");
    }
    Ok(())
}

fn cmd_drift(state_dir: &Path, tripwire_mode: bool) -> Result<()> {
    let mut total_drift = 0;
    for name in state_stacks(state_dir)? {
        let Some(lock) = state::load_lock(state_dir, &name)? else {
            continue;
        };
        println!("Checking {} ({})...", name, lock.template_file);
        match drift::detect_drift(&lock) {
            None => println!("  No drift detected."),
            Some(f) => {
                tracing::info!(stack = %name, detail = %f.detail, "drift found");
                println!("  DRIFTED: {}", f.detail);
                println!("    Expected: {}", f.expected_hash);
                println!("    Actual:   {}", f.actual_hash);
                eventlog::append_event(
                    state_dir,
                    &name,
                    ProvenanceEvent::DriftDetected {
                        stack: f.stack,
                        template_file: f.template_file,
                        expected_hash: f.expected_hash,
                        actual_hash: f.actual_hash,
                    },
                )?;
                total_drift += 1;
            }
        }
    }

    if total_drift > 0 {
        tracing::warn!(stacks = total_drift, "drift detected");
        println!();
        println!("Drift detected: {} stack(s)", total_drift);
        if tripwire_mode {
            return Err(MusabiError::State {
                path: state_dir.display().to_string(),
                reason: format!("{} drift finding(s)", total_drift),
            });
        }
    } else {
        println!("No drift detected.");
    }
    Ok(())
}

fn cmd_schema() -> Result<()> {
    let schema = schemars::schema_for!(StackConfig);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
