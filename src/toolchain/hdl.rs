//! HDL toolchain: the test specification file is a VHDL testbench. The
//! student's design and the testbench are analysed and elaborated once; each
//! declared vector is then one simulation run with its own generic values.
//! Optional synthesis checks that the design yields a bitstream.
//!
//! HDL 工具链：测试规范文件就是 VHDL 测试平台。学生设计与测试平台只分析和细化一次；
//! 每个声明的测试向量对应一次带有自己泛型参数的仿真运行。

use std::path::{Path, PathBuf};

use super::{
    ArtifactKind, BuildArtifact, BuildFailure, Built, ExecContext, RunFailure, RunObservation,
    Verdict, build_step, run_step, student_sources,
};
use crate::core::config::EffectiveConfig;
use crate::core::directive::SubTestDeclaration;
use crate::infra::command::Invocation;

/// Simulator output that marks a failed assertion or a `report ... severity failure`.
const FAILURE_MARKERS: [&str; 3] = ["(assertion error)", "(assertion failure)", "(report failure)"];

fn workdir_flag(workdir: &Path) -> String {
    format!("--workdir={}", workdir.display())
}

/// The batch script fed to the synthesizer on stdin.
pub fn synthesis_script(
    sources: &[PathBuf],
    constraints: Option<&Path>,
    top: &str,
    part: &str,
    bitstream: &Path,
) -> String {
    let mut tcl = String::new();
    for source in sources {
        tcl.push_str(&format!("read_vhdl {{{}}}\n", source.display()));
    }
    if let Some(xdc) = constraints {
        tcl.push_str(&format!("read_xdc {{{}}}\n", xdc.display()));
    }
    tcl.push_str(&format!("synth_design -top {top} -part {part}\n"));
    tcl.push_str("opt_design\npower_opt_design\nplace_design\nphys_opt_design\nroute_design\n");
    tcl.push_str(&format!("write_bitstream -force {{{}}}\n", bitstream.display()));
    tcl.push_str("exit\n");
    tcl
}

pub(super) async fn build(
    ctx: &ExecContext<'_>,
    cfg: &EffectiveConfig,
    build_dir: &Path,
) -> Result<Built, BuildFailure> {
    let simulator = ctx
        .tool("SIMULATOR")
        .map_err(|tool| BuildFailure::Unavailable { tool })?;
    let entity = cfg.build.entity.clone().unwrap_or_default();
    let sources = student_sources(ctx.submission, &cfg.build.sources, &["vhd", "vhdl"])
        .map_err(|log| BuildFailure::Diagnostics {
            log,
            exit_code: None,
        })?;
    let test_dir = ctx.test_dir();

    // Design units must be analysed before the units that use them.
    let mut units = sources.clone();
    units.extend(cfg.build.testbench.iter().map(|tb| test_dir.join(tb)));
    units.push(ctx.spec.path.clone());

    let mut log = String::new();
    for unit in &units {
        let analyse = Invocation::new(simulator)
            .arg("-a")
            .args(&cfg.build.ghdl_options)
            .arg(workdir_flag(build_dir))
            .arg(unit)
            .current_dir(build_dir);
        build_step(
            ctx.invoke(&analyse, cfg.limits.build_timeout, cfg).await,
            &mut log,
        )?;
    }
    let elaborate = Invocation::new(simulator)
        .arg("-e")
        .args(&cfg.build.ghdl_options)
        .arg(workdir_flag(build_dir))
        .arg(&entity)
        .current_dir(build_dir);
    build_step(
        ctx.invoke(&elaborate, cfg.limits.build_timeout, cfg).await,
        &mut log,
    )?;

    let bitstream = if cfg.build.synth {
        Some(synthesize(ctx, cfg, build_dir, &sources, &mut log).await?)
    } else {
        None
    };

    Ok(Built {
        kind: ArtifactKind::Design {
            workdir: build_dir.to_path_buf(),
            entity,
            bitstream,
        },
        log,
    })
}

async fn synthesize(
    ctx: &ExecContext<'_>,
    cfg: &EffectiveConfig,
    build_dir: &Path,
    sources: &[PathBuf],
    log: &mut String,
) -> Result<PathBuf, BuildFailure> {
    let synthesizer = ctx
        .tool("SYNTHESIZER")
        .map_err(|tool| BuildFailure::Unavailable { tool })?;
    let top = cfg.build.top.clone().unwrap_or_default();
    let bitstream = build_dir.join(format!("{top}.bit"));
    let constraints = constraints_file(ctx, cfg, &top);
    let script = synthesis_script(
        sources,
        constraints.as_deref(),
        &top,
        &cfg.build.part,
        &bitstream,
    );
    let invocation = Invocation::new(synthesizer)
        .arg("-log")
        .arg(build_dir.join("synth.log"))
        .arg("-tempDir")
        .arg(build_dir)
        .args(["-mode", "tcl", "-nojournal"])
        .stdin(Some(script))
        .current_dir(build_dir);
    build_step(
        ctx.invoke(&invocation, cfg.limits.synth_timeout, cfg).await,
        log,
    )?;
    if !bitstream.is_file() {
        log.push_str(&format!(
            "\nsynthesis finished without producing {}\n",
            bitstream.display()
        ));
        return Err(BuildFailure::Diagnostics {
            log: log.clone(),
            exit_code: Some(0),
        });
    }
    Ok(bitstream)
}

/// The declared constraints file, else `<top>.xdc` when the submission has one.
fn constraints_file(ctx: &ExecContext<'_>, cfg: &EffectiveConfig, top: &str) -> Option<PathBuf> {
    match &cfg.build.constraints {
        Some(declared) => Some(ctx.submission.root.join(declared)),
        None => {
            let default = ctx.submission.root.join(format!("{top}.xdc"));
            default.is_file().then_some(default)
        }
    }
}

/// Collects the simulator lines that report a failed assertion.
pub fn assertion_failures(output: &str) -> Option<String> {
    let lines: Vec<&str> = output
        .lines()
        .filter(|line| FAILURE_MARKERS.iter().any(|m| line.contains(m)))
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

pub(super) async fn run(
    ctx: &ExecContext<'_>,
    artifact: &BuildArtifact,
    decl: &SubTestDeclaration,
    cfg: &EffectiveConfig,
) -> Result<RunObservation, RunFailure> {
    let simulator = ctx
        .tool("SIMULATOR")
        .map_err(|tool| RunFailure::Unavailable { tool })?;
    let ArtifactKind::Design {
        workdir, entity, ..
    } = &artifact.kind
    else {
        return Err(RunFailure::Spawn("artifact is not an elaborated design".to_string()));
    };

    let invocation = Invocation::new(simulator)
        .arg("-r")
        .args(&cfg.build.ghdl_options)
        .arg(workdir_flag(workdir))
        .args(decl.generics.iter().map(|(k, v)| format!("-g{k}={v}")))
        .arg(entity)
        .arg("--assert-level=error")
        .args(&cfg.run.args)
        .stdin(cfg.run.input.clone().or_else(|| decl.body_text()))
        .current_dir(workdir);
    let raw = run_step(ctx.invoke(&invocation, cfg.limits.timeout, cfg).await)?;

    let verdict = match assertion_failures(&raw.combined_output()) {
        Some(detail) => Verdict::AssertionFailed { detail },
        None => Verdict::Normal,
    };
    Ok(RunObservation {
        observed: raw.stdout.clone(),
        raw,
        verdict,
    })
}
