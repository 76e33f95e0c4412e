//! # Configuration Resolution Module / 配置解析模块
//!
//! Merges the four configuration layers of a sub-test into one typed
//! [`EffectiveConfig`]: compiled defaults (overlaid by the store's `[global]`
//! table) < cohort overrides < file directives < sub-test directives.
//!
//! Resolution is pure. It never logs, never touches the file system beyond
//! expanding `~`/`$VAR` in paths, and returns identical output for identical
//! input, which is what lets [`crate::core::items::TestItem`] cache it.
//!
//! 将子测试的四个配置层合并为一个类型化的 [`EffectiveConfig`]。
//! 解析是纯函数：相同的输入总是产生相同的输出，因此可以被缓存。

use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::core::classify::extract_numbers;
use crate::core::directive::{DirectiveSet, Occurrence};
use crate::core::grammar::{self, DirectiveSpec, Scope, ValueType};
use crate::core::models::ToolchainKind;

/// The configuration layers, lowest precedence first.
/// 配置层，按优先级从低到高排列。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerSource {
    Defaults,
    Cohort,
    File,
    SubTest,
}

impl LayerSource {
    /// Whether keys of the given scope may be set from this layer.
    pub fn permits(self, scope: Scope) -> bool {
        match scope {
            Scope::Any => true,
            Scope::Environment => matches!(self, Self::Defaults | Self::Cohort),
        }
    }
}

impl fmt::Display for LayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Defaults => "defaults",
            Self::Cohort => "cohort",
            Self::File => "file",
            Self::SubTest => "sub-test",
        })
    }
}

/// Errors raised while resolving or loading configuration.
/// 解析或加载配置时产生的错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key} (set by {layer}): {reason}")]
    Invalid {
        key: String,
        layer: LayerSource,
        value: String,
        reason: String,
    },
    #[error("{key} is required for {kind} test files")]
    Missing { key: String, kind: ToolchainKind },
    #[error("duplicate sub-test name {name:?} at line {line}")]
    Duplicate { name: String, line: usize },
    #[error("configuration store: {0}")]
    Store(String),
}

/// A typed value held by the configuration store.
/// 配置存储中保存的类型化值。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Path(PathBuf),
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    fn from_toml(key: &str, value: toml::Value) -> Result<Self, ConfigError> {
        Ok(match value {
            toml::Value::String(s) => Self::String(s),
            toml::Value::Integer(i) => Self::Integer(i),
            toml::Value::Float(f) => Self::Float(f),
            toml::Value::Boolean(b) => Self::Bool(b),
            toml::Value::Array(items) => Self::List(
                items
                    .into_iter()
                    .map(|item| Self::from_toml(key, item))
                    .collect::<Result<_, _>>()?,
            ),
            other => {
                return Err(ConfigError::Store(format!(
                    "unsupported value for {key}: {other}"
                )));
            }
        })
    }

    /// The textual form a scalar value is coerced from.
    fn scalar_text(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Path(p) => Some(p.display().to_string()),
            Self::List(_) => None,
        }
    }

    fn display_text(&self) -> String {
        match self {
            Self::List(items) => items
                .iter()
                .map(Self::display_text)
                .collect::<Vec<_>>()
                .join(" "),
            scalar => scalar.scalar_text().unwrap_or_default(),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<PathBuf> for ConfigValue {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

/// A value as one layer holds it, before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerValue {
    /// Verbatim directive occurrences, in file order.
    Directive(Vec<Occurrence>),
    Typed(ConfigValue),
}

/// One layer of the configuration hierarchy.
/// 配置层次结构中的一层。
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayer {
    pub source: LayerSource,
    values: BTreeMap<String, LayerValue>,
}

impl ConfigLayer {
    pub fn new(source: LayerSource) -> Self {
        Self {
            source,
            values: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) {
        self.values
            .insert(key.to_ascii_uppercase(), LayerValue::Typed(value.into()));
    }

    pub fn with(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn from_directives(source: LayerSource, directives: &DirectiveSet) -> Self {
        let values = directives
            .iter()
            .map(|(key, occurrences)| (key.to_string(), LayerValue::Directive(occurrences.to_vec())))
            .collect();
        Self { source, values }
    }

    /// The compiled-in defaults for one toolchain.
    pub fn defaults(kind: ToolchainKind) -> Self {
        let mut layer = Self::new(LayerSource::Defaults);
        for spec in grammar::TABLE.iter().filter(|s| s.applies_to(kind)) {
            if let Some(value) = spec.default.for_kind(kind) {
                layer.set(spec.key, value);
            }
        }
        layer
    }

    pub fn get(&self, key: &str) -> Option<&LayerValue> {
        self.values.get(&key.to_ascii_uppercase())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct StoreFile {
    name: Option<String>,
    #[serde(default)]
    global: toml::Table,
    #[serde(default)]
    cohort: toml::Table,
}

/// Flat key/value defaults and cohort overrides.
///
/// ```toml
/// name = "spring-2026"
///
/// [global]
/// TIMEOUT = "30s"
///
/// [cohort]
/// COMPILER = "gcc"
/// SEARCH_PATHS = ["/opt/Xilinx", "~/tools"]
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigStore {
    pub cohort_name: Option<String>,
    global: BTreeMap<String, ConfigValue>,
    cohort: BTreeMap<String, ConfigValue>,
}

impl ConfigStore {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: StoreFile =
            toml::from_str(content).map_err(|e| ConfigError::Store(e.to_string()))?;
        Ok(Self {
            cohort_name: file.name,
            global: Self::table(file.global)?,
            cohort: Self::table(file.cohort)?,
        })
    }

    /// Loads a store from a TOML file.
    /// 从 TOML 文件加载配置存储。
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse configuration: {}", path.display()))
    }

    fn table(table: toml::Table) -> Result<BTreeMap<String, ConfigValue>, ConfigError> {
        let mut values = BTreeMap::new();
        for (key, value) in table {
            let upper = key.to_ascii_uppercase();
            if grammar::lookup(&upper).is_none() {
                warn!(key = %key, "Unknown configuration key ignored");
                continue;
            }
            values.insert(upper, ConfigValue::from_toml(&key, value)?);
        }
        Ok(values)
    }

    pub fn set_global(&mut self, key: &str, value: impl Into<ConfigValue>) {
        self.global.insert(key.to_ascii_uppercase(), value.into());
    }

    pub fn set_cohort(&mut self, key: &str, value: impl Into<ConfigValue>) {
        self.cohort.insert(key.to_ascii_uppercase(), value.into());
    }

    /// Compiled defaults for `kind`, overlaid by the `[global]` table.
    pub fn defaults_layer(&self, kind: ToolchainKind) -> ConfigLayer {
        let mut layer = ConfigLayer::defaults(kind);
        for (key, value) in &self.global {
            layer.set(key, value.clone());
        }
        layer
    }

    pub fn cohort_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::new(LayerSource::Cohort);
        for (key, value) in &self.cohort {
            layer.set(key, value.clone());
        }
        layer
    }
}

/// The output comparison selected by `COMPARE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    #[default]
    Exact,
    Numeric,
    Contains,
    Regex,
}

impl FromStr for CompareMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "numeric" => Ok(Self::Numeric),
            "contains" => Ok(Self::Contains),
            "regex" => Ok(Self::Regex),
            other => Err(format!(
                "unknown comparison mode '{other}' (expected exact, numeric, contains or regex)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildSettings {
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub include: Vec<PathBuf>,
    pub defines: Vec<String>,
    pub sources: Vec<String>,
    pub mocks: Vec<String>,
    pub module: Option<String>,
    pub entity: Option<String>,
    pub testbench: Vec<String>,
    pub ghdl_options: Vec<String>,
    pub synth: bool,
    pub top: Option<String>,
    pub part: String,
    pub constraints: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LintSettings {
    pub enabled: bool,
    pub checks: Vec<String>,
    pub max_warnings: u64,
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSettings {
    pub args: Vec<String>,
    pub input: Option<String>,
    pub entry: Option<String>,
    pub expect: Option<String>,
    pub compare: CompareMode,
    pub epsilon: f64,
    pub exit_code: i32,
    pub assert_exit: bool,
}

/// Wall-clock bounds. `None` means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Limits {
    pub timeout: Option<Duration>,
    pub build_timeout: Option<Duration>,
    pub lint_timeout: Option<Duration>,
    pub synth_timeout: Option<Duration>,
    pub output_cap: usize,
}

/// Executables and locations. Settable only by the defaults and cohort layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnvSettings {
    pub compiler: Option<String>,
    pub interpreter: Option<String>,
    pub linter: Option<String>,
    pub simulator: Option<String>,
    pub synthesizer: Option<String>,
    pub search_paths: Vec<PathBuf>,
    pub build_root: Option<PathBuf>,
    pub keep_failed: Option<PathBuf>,
}

/// The fully resolved parameters of one sub-test.
/// 一个子测试的完全解析后的参数。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    pub kind: ToolchainKind,
    pub build: BuildSettings,
    pub lint: LintSettings,
    pub run: RunSettings,
    pub limits: Limits,
    pub env: EnvSettings,
    /// The layer each resolved key came from.
    pub provenance: BTreeMap<String, LayerSource>,
}

impl EffectiveConfig {
    /// Identity of the build this config produces. Sub-tests of one file with
    /// equal keys share a single build artifact.
    pub fn artifact_key(&self) -> String {
        format!(
            "{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}",
            self.kind,
            self.build,
            self.env.compiler,
            self.env.interpreter,
            self.env.simulator,
            self.env.synthesizer,
            (
                self.limits.build_timeout,
                self.limits.synth_timeout,
                self.limits.output_cap,
                &self.env.build_root,
                &self.env.keep_failed,
            ),
        )
    }

    pub fn source_of(&self, key: &str) -> Option<LayerSource> {
        self.provenance.get(&key.to_ascii_uppercase()).copied()
    }
}

/// Resolves the effective configuration of one sub-test.
///
/// Layers are consulted from `subtest` down to `defaults`; the first layer that
/// sets a key (and is permitted to) wins that key. Within the winning layer a
/// scalar takes its last occurrence and a list concatenates all occurrences.
///
/// 从 `subtest` 到 `defaults` 依次查询各层；第一个设置了某键（且被允许设置）的层胜出。
pub fn resolve(
    kind: ToolchainKind,
    defaults: &ConfigLayer,
    cohort: &ConfigLayer,
    file: &ConfigLayer,
    subtest: &ConfigLayer,
) -> Result<EffectiveConfig, ConfigError> {
    let mut r = Resolver {
        kind,
        layers: [subtest, file, cohort, defaults],
        provenance: BTreeMap::new(),
    };

    let build = BuildSettings {
        cflags: r.list("CFLAGS")?,
        ldflags: r.list("LDFLAGS")?,
        include: r.paths("INCLUDE")?,
        defines: r.list("DEFINES")?,
        sources: r.list("SOURCES")?,
        mocks: r.list("MOCKS")?,
        module: r.string("MODULE")?,
        entity: r.string("ENTITY")?,
        testbench: r.list("TESTBENCH")?,
        ghdl_options: r.list("GHDL_OPTIONS")?,
        synth: r.boolean("SYNTH")?.unwrap_or(false),
        top: r.string("TOP")?,
        part: r.string("PART")?.unwrap_or_default(),
        constraints: r.string("CONSTRAINTS")?,
    };

    let checks = r.list("CHECKS")?;
    let threshold = r.float("LINT_THRESHOLD")?;
    let forced = r.boolean("LINT")?.unwrap_or(false);
    let max_warnings = match r.integer("MAX_WARNINGS")? {
        Some(n) => u64::try_from(n).map_err(|_| r.invalid("MAX_WARNINGS", "must not be negative"))?,
        None => 0,
    };
    let lint = LintSettings {
        enabled: forced || !checks.is_empty() || threshold.is_some(),
        checks,
        max_warnings,
        threshold,
    };

    let exit_code = match r.integer("EXIT_CODE")? {
        Some(n) => i32::try_from(n).map_err(|_| r.invalid("EXIT_CODE", "out of range"))?,
        None => 0,
    };
    let run = RunSettings {
        args: r.list("ARGS")?,
        input: r.string("INPUT")?,
        entry: r.string("ENTRY")?,
        expect: r.string("EXPECT")?,
        compare: r.mode("COMPARE")?.unwrap_or_default(),
        epsilon: r.float("EPSILON")?.unwrap_or(1e-6),
        exit_code,
        assert_exit: r.boolean("ASSERT_EXIT")?.unwrap_or(false),
    };
    if run.epsilon < 0.0 {
        return Err(r.invalid("EPSILON", "must not be negative"));
    }

    let output_cap = match r.integer("OUTPUT_CAP")? {
        Some(n) if n > 0 => usize::try_from(n).map_err(|_| r.invalid("OUTPUT_CAP", "out of range"))?,
        Some(_) => return Err(r.invalid("OUTPUT_CAP", "must be positive")),
        None => 65536,
    };
    let limits = Limits {
        timeout: r.duration("TIMEOUT")?,
        build_timeout: r.duration("BUILD_TIMEOUT")?,
        lint_timeout: r.duration("LINT_TIMEOUT")?,
        synth_timeout: r.duration("SYNTH_TIMEOUT")?,
        output_cap,
    };

    let env = EnvSettings {
        compiler: r.string("COMPILER")?,
        interpreter: r.string("INTERPRETER")?,
        linter: r.string("LINTER")?,
        simulator: r.string("SIMULATOR")?,
        synthesizer: r.string("SYNTHESIZER")?,
        search_paths: r.paths("SEARCH_PATHS")?,
        build_root: r.path("BUILD_ROOT")?,
        keep_failed: r.path("KEEP_FAILED")?,
    };

    validate_expectation(&mut r, &run)?;
    match kind {
        ToolchainKind::Compiled => {}
        ToolchainKind::Script if build.module.is_none() => return Err(r.missing("MODULE")),
        ToolchainKind::Script => {}
        ToolchainKind::Hdl if build.entity.is_none() => return Err(r.missing("ENTITY")),
        ToolchainKind::Hdl if build.synth && build.top.is_none() => return Err(r.missing("TOP")),
        ToolchainKind::Hdl => {}
    }

    Ok(EffectiveConfig {
        kind,
        build,
        lint,
        run,
        limits,
        env,
        provenance: r.provenance,
    })
}

fn validate_expectation(r: &mut Resolver<'_>, run: &RunSettings) -> Result<(), ConfigError> {
    let Some(expect) = &run.expect else {
        return Ok(());
    };
    match run.compare {
        CompareMode::Regex => {
            regex::Regex::new(expect).map_err(|e| r.invalid("EXPECT", &e.to_string()))?;
        }
        CompareMode::Numeric if extract_numbers(expect).is_empty() => {
            return Err(r.invalid("EXPECT", "numeric comparison needs at least one number"));
        }
        _ => {}
    }
    Ok(())
}

/// Parses a duration: a bare number is seconds, `ms`/`s`/`m`/`h` suffixes are
/// accepted and `none` (or any zero) means unbounded.
///
/// 解析时长：纯数字表示秒，支持 `ms`/`s`/`m`/`h` 后缀，`none`（或零）表示不限时。
pub fn parse_duration(text: &str) -> Result<Option<Duration>, String> {
    let text = text.trim().to_ascii_lowercase();
    if matches!(text.as_str(), "none" | "off" | "never") {
        return Ok(None);
    }
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| format!("'{text}' is not a duration"))?;
    let scale = match unit.trim() {
        "" | "s" | "sec" | "secs" => 1.0,
        "ms" => 0.001,
        "m" | "min" => 60.0,
        "h" => 3600.0,
        other => return Err(format!("unknown duration unit '{other}'")),
    };
    let secs = value * scale;
    if secs == 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|e| e.to_string())
}

fn parse_bool(text: &str) -> Result<bool, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "" | "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(format!("'{other}' is not a boolean")),
    }
}

fn split_words(text: &str) -> Vec<String> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn expand(text: &str) -> Result<PathBuf, String> {
    shellexpand::full(text)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| e.to_string())
}

struct Resolver<'a> {
    kind: ToolchainKind,
    /// Highest precedence first.
    layers: [&'a ConfigLayer; 4],
    provenance: BTreeMap<String, LayerSource>,
}

/// A winning layer value, ready for coercion.
struct Winner<'a> {
    spec: &'static DirectiveSpec,
    source: LayerSource,
    value: &'a LayerValue,
}

impl Winner<'_> {
    fn text(&self) -> String {
        match self.value {
            LayerValue::Directive(occurrences) => occurrences
                .iter()
                .map(|o| o.value.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            LayerValue::Typed(value) => value.display_text(),
        }
    }

    fn invalid(&self, reason: &str) -> ConfigError {
        ConfigError::Invalid {
            key: self.spec.key.to_string(),
            layer: self.source,
            value: self.text(),
            reason: reason.to_string(),
        }
    }

    fn scalar(&self) -> Result<String, ConfigError> {
        match self.value {
            LayerValue::Directive(occurrences) => occurrences
                .last()
                .map(|o| o.value.clone())
                .ok_or_else(|| self.invalid("no value")),
            LayerValue::Typed(value) => value
                .scalar_text()
                .ok_or_else(|| self.invalid("expected a single value, found a list")),
        }
    }

    /// List items: directive occurrences are split and concatenated, typed
    /// lists keep one item per element.
    fn items(&self) -> Result<Vec<String>, ConfigError> {
        let split = |text: &str| -> Result<Vec<String>, ConfigError> {
            match self.spec.ty {
                ValueType::Flags => {
                    shlex::split(text).ok_or_else(|| self.invalid("unbalanced quotes"))
                }
                _ => Ok(split_words(text)),
            }
        };
        match self.value {
            LayerValue::Directive(occurrences) => {
                let mut items = Vec::new();
                for occurrence in occurrences {
                    items.extend(split(&occurrence.value)?);
                }
                Ok(items)
            }
            LayerValue::Typed(ConfigValue::List(values)) => Ok(values
                .iter()
                .map(ConfigValue::display_text)
                .collect()),
            LayerValue::Typed(value) => split(&value.display_text()),
        }
    }
}

impl<'a> Resolver<'a> {
    fn find(&self, key: &str) -> Option<Winner<'a>> {
        let spec = grammar::lookup(key)?;
        if !spec.applies_to(self.kind) {
            return None;
        }
        self.layers.into_iter().find_map(|layer| {
            if !layer.source.permits(spec.scope) {
                return None;
            }
            layer.get(key).map(|value| Winner {
                spec,
                source: layer.source,
                value,
            })
        })
    }

    fn winner(&mut self, key: &str) -> Option<Winner<'a>> {
        let winner = self.find(key)?;
        self.provenance
            .insert(winner.spec.key.to_string(), winner.source);
        Some(winner)
    }

    fn invalid(&self, key: &str, reason: &str) -> ConfigError {
        match self.find(key) {
            Some(winner) => winner.invalid(reason),
            None => ConfigError::Invalid {
                key: key.to_string(),
                layer: LayerSource::Defaults,
                value: String::new(),
                reason: reason.to_string(),
            },
        }
    }

    fn missing(&self, key: &str) -> ConfigError {
        ConfigError::Missing {
            key: key.to_string(),
            kind: self.kind,
        }
    }

    fn string(&mut self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.winner(key) {
            Some(w) => w.scalar().map(Some),
            None => Ok(None),
        }
    }

    fn integer(&mut self, key: &str) -> Result<Option<i64>, ConfigError> {
        let Some(w) = self.winner(key) else {
            return Ok(None);
        };
        let text = w.scalar()?;
        text.trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| w.invalid("expected an integer"))
    }

    fn float(&mut self, key: &str) -> Result<Option<f64>, ConfigError> {
        let Some(w) = self.winner(key) else {
            return Ok(None);
        };
        let text = w.scalar()?;
        match text.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Some(value)),
            _ => Err(w.invalid("expected a finite number")),
        }
    }

    fn boolean(&mut self, key: &str) -> Result<Option<bool>, ConfigError> {
        let Some(w) = self.winner(key) else {
            return Ok(None);
        };
        parse_bool(&w.scalar()?).map(Some).map_err(|e| w.invalid(&e))
    }

    fn duration(&mut self, key: &str) -> Result<Option<Duration>, ConfigError> {
        let Some(w) = self.winner(key) else {
            return Ok(None);
        };
        parse_duration(&w.scalar()?).map_err(|e| w.invalid(&e))
    }

    fn mode(&mut self, key: &str) -> Result<Option<CompareMode>, ConfigError> {
        let Some(w) = self.winner(key) else {
            return Ok(None);
        };
        w.scalar()?.parse().map(Some).map_err(|e: String| w.invalid(&e))
    }

    fn path(&mut self, key: &str) -> Result<Option<PathBuf>, ConfigError> {
        let Some(w) = self.winner(key) else {
            return Ok(None);
        };
        expand(&w.scalar()?).map(Some).map_err(|e| w.invalid(&e))
    }

    fn list(&mut self, key: &str) -> Result<Vec<String>, ConfigError> {
        match self.winner(key) {
            Some(w) => w.items(),
            None => Ok(Vec::new()),
        }
    }

    fn paths(&mut self, key: &str) -> Result<Vec<PathBuf>, ConfigError> {
        let Some(w) = self.winner(key) else {
            return Ok(Vec::new());
        };
        w.items()?
            .iter()
            .map(|item| expand(item).map_err(|e| w.invalid(&e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("2"), Ok(Some(Duration::from_secs(2))));
        assert_eq!(parse_duration("500ms"), Ok(Some(Duration::from_millis(500))));
        assert_eq!(parse_duration("1.5s"), Ok(Some(Duration::from_millis(1500))));
        assert_eq!(parse_duration("3m"), Ok(Some(Duration::from_secs(180))));
        assert_eq!(parse_duration("none"), Ok(None));
        assert_eq!(parse_duration("0"), Ok(None));
        assert!(parse_duration("slow").is_err());
        assert!(parse_duration("5 fortnights").is_err());
    }

    #[test]
    fn booleans() {
        assert_eq!(parse_bool(""), Ok(true));
        assert_eq!(parse_bool("Yes"), Ok(true));
        assert_eq!(parse_bool("off"), Ok(false));
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn words_split_on_commas_and_spaces() {
        assert_eq!(split_words("a.c, b.c  c.c"), vec!["a.c", "b.c", "c.c"]);
    }

    #[test]
    fn compare_mode_is_case_insensitive() {
        assert_eq!("Numeric".parse::<CompareMode>(), Ok(CompareMode::Numeric));
        assert!("fuzzy".parse::<CompareMode>().is_err());
    }
}
