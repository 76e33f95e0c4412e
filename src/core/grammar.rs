//! # Directive Grammar / 指令语法表
//!
//! One table maps every directive key to its value type, compiled-in default,
//! the toolchains that recognise it and the configuration layers allowed to set
//! it. Adding a directive is a new row here, not new parsing code.
//!
//! 一张表将每个指令键映射到其值类型、内置默认值、识别它的工具链以及允许设置它的配置层。

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use crate::core::models::ToolchainKind;

/// The type a directive value is coerced to during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Str,
    Int,
    Float,
    Bool,
    /// `500ms`, `2s`, `1.5`, `3m`, or `none` for an unbounded phase.
    Duration,
    Path,
    /// Shell-word list, for compiler and simulator flags.
    Flags,
    /// Comma- or whitespace-separated list.
    Words,
    /// Comma- or whitespace-separated list of paths.
    Paths,
    /// One of `exact`, `numeric`, `contains`, `regex`.
    Mode,
}

impl ValueType {
    pub fn is_list(self) -> bool {
        matches!(self, Self::Flags | Self::Words | Self::Paths)
    }
}

/// Which configuration layers may set a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Any layer, from compiled defaults to sub-test directives.
    Any,
    /// Environment keys (executables, search roots, build locations): only the
    /// defaults and cohort layers. Directives naming them are ignored.
    Environment,
}

/// Compiled-in default of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    None,
    All(&'static str),
    PerKind {
        compiled: Option<&'static str>,
        script: Option<&'static str>,
        hdl: Option<&'static str>,
    },
}

impl DefaultValue {
    pub fn for_kind(self, kind: ToolchainKind) -> Option<&'static str> {
        match self {
            DefaultValue::None => None,
            DefaultValue::All(value) => Some(value),
            DefaultValue::PerKind {
                compiled,
                script,
                hdl,
            } => match kind {
                ToolchainKind::Compiled => compiled,
                ToolchainKind::Script => script,
                ToolchainKind::Hdl => hdl,
            },
        }
    }
}

/// One row of the grammar table.
#[derive(Debug, Clone, Copy)]
pub struct DirectiveSpec {
    pub key: &'static str,
    pub ty: ValueType,
    pub default: DefaultValue,
    pub scope: Scope,
    /// Toolchains whose parser recognises the key. Empty means all.
    pub kinds: &'static [ToolchainKind],
    pub help: &'static str,
}

impl DirectiveSpec {
    pub fn applies_to(&self, kind: ToolchainKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }
}

const C: ToolchainKind = ToolchainKind::Compiled;
const PY: ToolchainKind = ToolchainKind::Script;
const HDL: ToolchainKind = ToolchainKind::Hdl;

const fn row(
    key: &'static str,
    ty: ValueType,
    default: DefaultValue,
    scope: Scope,
    kinds: &'static [ToolchainKind],
    help: &'static str,
) -> DirectiveSpec {
    DirectiveSpec {
        key,
        ty,
        default,
        scope,
        kinds,
        help,
    }
}

use Scope::{Any, Environment};
use ValueType::*;

pub const TABLE: &[DirectiveSpec] = &[
    // Build
    row("CFLAGS", Flags, DefaultValue::All("-Wall -std=gnu99"), Any, &[C], "compile flags"),
    row("LDFLAGS", Flags, DefaultValue::None, Any, &[C], "link flags"),
    row("INCLUDE", Paths, DefaultValue::None, Any, &[C], "extra include paths"),
    row("DEFINES", Words, DefaultValue::None, Any, &[C], "-D declarations"),
    row("SOURCES", Words, DefaultValue::None, Any, &[C, HDL], "student source files"),
    row("MOCKS", Words, DefaultValue::None, Any, &[C], "instructor mock sources"),
    row("MODULE", Str, DefaultValue::None, Any, &[PY], "student module under test"),
    row("ENTITY", Str, DefaultValue::None, Any, &[HDL], "top-level testbench unit"),
    row("TESTBENCH", Words, DefaultValue::None, Any, &[HDL], "testbench files"),
    row(
        "GHDL_OPTIONS",
        Flags,
        DefaultValue::All("--std=08 --warn-no-hide"),
        Any,
        &[HDL],
        "simulator flags",
    ),
    row("SYNTH", Bool, DefaultValue::All("false"), Any, &[HDL], "run synthesis"),
    row("TOP", Str, DefaultValue::None, Any, &[HDL], "synthesis top entity"),
    row("PART", Str, DefaultValue::All("xc7a35tcpg236-1"), Any, &[HDL], "synthesis part"),
    row("CONSTRAINTS", Str, DefaultValue::None, Any, &[HDL], "constraints file"),
    // Lint
    row("CHECKS", Words, DefaultValue::None, Any, &[], "lint check list"),
    row("LINT", Bool, DefaultValue::All("false"), Any, &[], "force the lint step"),
    row("MAX_WARNINGS", Int, DefaultValue::All("0"), Any, &[C], "lint warning threshold"),
    row("LINT_THRESHOLD", Float, DefaultValue::None, Any, &[PY], "minimum lint score"),
    // Limits
    row("TIMEOUT", Duration, DefaultValue::All("10s"), Any, &[], "run-phase bound"),
    row("BUILD_TIMEOUT", Duration, DefaultValue::All("60s"), Any, &[], "build-phase bound"),
    row("LINT_TIMEOUT", Duration, DefaultValue::All("60s"), Any, &[], "lint-phase bound"),
    row("SYNTH_TIMEOUT", Duration, DefaultValue::All("600s"), Any, &[HDL], "synthesis bound"),
    row("OUTPUT_CAP", Int, DefaultValue::All("65536"), Any, &[], "capture cap in bytes"),
    // Run and compare
    row("ARGS", Flags, DefaultValue::None, Any, &[], "program arguments"),
    row("INPUT", Str, DefaultValue::None, Any, &[], "standard input"),
    row("ENTRY", Str, DefaultValue::None, Any, &[PY], "entry point to call"),
    row("EXPECT", Str, DefaultValue::None, Any, &[], "expected output"),
    row("COMPARE", Mode, DefaultValue::All("exact"), Any, &[], "comparison mode"),
    row("EPSILON", Float, DefaultValue::All("1e-6"), Any, &[], "numeric tolerance"),
    row("EXIT_CODE", Int, DefaultValue::All("0"), Any, &[C, PY], "expected exit code"),
    row("ASSERT_EXIT", Bool, DefaultValue::All("false"), Any, &[C, PY], "exit status is the assertion"),
    // Environment
    row("COMPILER", Str, DefaultValue::All("cc"), Environment, &[C], "C compiler"),
    row("INTERPRETER", Str, DefaultValue::All("python3"), Environment, &[PY], "Python interpreter"),
    row(
        "LINTER",
        Str,
        DefaultValue::PerKind {
            compiled: Some("clang-tidy"),
            script: Some("pylint"),
            hdl: None,
        },
        Environment,
        &[],
        "lint executable",
    ),
    row("SIMULATOR", Str, DefaultValue::All("ghdl"), Environment, &[HDL], "VHDL simulator"),
    row("SYNTHESIZER", Str, DefaultValue::All("vivado"), Environment, &[HDL], "synthesis tool"),
    row(
        "SEARCH_PATHS",
        Paths,
        DefaultValue::All("/opt/Xilinx /usr/local"),
        Environment,
        &[],
        "extra executable search roots",
    ),
    row("BUILD_ROOT", Path, DefaultValue::None, Environment, &[], "build directory root"),
    row("KEEP_FAILED", Path, DefaultValue::None, Environment, &[], "failed build archive"),
];

static BY_KEY: Lazy<BTreeMap<&'static str, &'static DirectiveSpec>> =
    Lazy::new(|| TABLE.iter().map(|spec| (spec.key, spec)).collect());

/// Looks a key up case-insensitively.
pub fn lookup(key: &str) -> Option<&'static DirectiveSpec> {
    BY_KEY.get(key.to_ascii_uppercase().as_str()).copied()
}

/// Returns the grammar row when `key` is part of `kind`'s directive vocabulary.
pub fn recognised(kind: ToolchainKind, key: &str) -> Option<&'static DirectiveSpec> {
    lookup(key).filter(|spec| spec.applies_to(kind))
}
