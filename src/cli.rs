//! # Command-Line Interface / 命令行接口
//!
//! The reference host. `collect` lists the sub-tests of test specification
//! files; `run` executes them against one submission and reports the results.
//!
//! 参考宿主。`collect` 列出测试规范文件中的子测试；`run` 针对一份提交执行它们并报告结果。

pub mod commands;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf};

use crate::infra::t;

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
fn pre_parse_language() -> String {
    let args: Vec<String> = env::args().collect();
    if let Some(pos) = args.iter().position(|arg| arg == "--lang") {
        if let Some(lang) = args.get(pos + 1) {
            return lang.clone();
        }
    }
    sys_locale::get_locale().unwrap_or_else(|| "en".to_string())
}

fn files_arg(locale: &str) -> Arg {
    Arg::new("files")
        .help(t!("arg_files", locale = locale).to_string())
        .value_name("FILE")
        .required(true)
        .num_args(1..)
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Append)
}

fn config_arg(locale: &str) -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .help(t!("arg_config", locale = locale).to_string())
        .value_name("CONFIG")
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

fn set_arg(locale: &str) -> Arg {
    Arg::new("set")
        .long("set")
        .help(t!("arg_set", locale = locale).to_string())
        .value_name("KEY=VALUE")
        .action(ArgAction::Append)
}

pub fn build_cli(locale: &str) -> Command {
    Command::new("automark")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli_about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cmd_run_about", locale = locale).to_string())
                .arg(
                    Arg::new("submission")
                        .short('s')
                        .long("submission")
                        .help(t!("arg_submission", locale = locale).to_string())
                        .value_name("DIR")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("student")
                        .long("student")
                        .help(t!("arg_student", locale = locale).to_string())
                        .value_name("NAME")
                        .action(ArgAction::Set),
                )
                .arg(config_arg(locale))
                .arg(set_arg(locale))
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help(t!("arg_jobs", locale = locale).to_string())
                        .value_name("JOBS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help(t!("arg_html", locale = locale).to_string())
                        .value_name("HTML")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help(t!("arg_json", locale = locale).to_string())
                        .value_name("JSON")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(files_arg(locale)),
        )
        .subcommand(
            Command::new("collect")
                .about(t!("cmd_collect_about", locale = locale).to_string())
                .arg(config_arg(locale))
                .arg(set_arg(locale))
                .arg(files_arg(locale)),
        )
}

fn many(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn files(matches: &ArgMatches) -> Vec<PathBuf> {
    matches
        .get_many::<PathBuf>("files")
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

pub async fn run() -> Result<()> {
    // Pre-parse language and initialize i18n first.
    let language = crate::select_locale(&pre_parse_language());
    rust_i18n::set_locale(language);

    let matches = build_cli(language).get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let args = commands::run::RunArgs {
                files: files(run_matches),
                submission: run_matches
                    .get_one::<PathBuf>("submission")
                    .cloned()
                    .unwrap_or_default(),
                student: run_matches.get_one::<String>("student").cloned(),
                config: run_matches.get_one::<PathBuf>("config").cloned(),
                overrides: many(run_matches, "set"),
                jobs: run_matches.get_one::<usize>("jobs").copied(),
                html: run_matches.get_one::<PathBuf>("html").cloned(),
                json: run_matches.get_one::<PathBuf>("json").cloned(),
            };
            commands::run::execute(args, language).await?;
        }
        Some(("collect", collect_matches)) => {
            commands::collect::execute(
                &files(collect_matches),
                collect_matches.get_one::<PathBuf>("config").cloned(),
                &many(collect_matches, "set"),
                language,
            )?;
        }
        _ => {
            // `subcommand_required` makes clap print the help and exit first.
        }
    }
    Ok(())
}
