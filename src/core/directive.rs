//! # Directive Parser Module / 指令解析模块
//!
//! Extracts the global directives and the ordered sub-test declarations from the
//! raw text of a test specification file. Nothing is executed and nothing is
//! coerced here: every value is kept verbatim with the line it came from, so a
//! malformed value surfaces later as a `ConfigError` on the affected sub-test.
//!
//! 从测试规范文件的原始文本中提取全局指令和有序的子测试声明。
//! 此处不执行任何代码，也不做类型转换：每个值都按原样保存并带有其所在行号。
//!
//! ## Syntax / 语法
//!
//! ```text
//! //@mark TIMEOUT=2 CHECKS=style
//! //@test test_add EXPECT=5
//! //| 2 3
//! //@with ARGS=add
//! --@vector small A=1 B=2
//! ```

use std::collections::BTreeMap;
use tracing::debug;

use crate::core::grammar::{self, Scope};
use crate::core::models::ToolchainKind;

/// One occurrence of a directive key, verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub value: String,
    /// 1-based line number.
    pub line: usize,
}

/// Directive key to every occurrence in file order. Keys are stored uppercase.
/// 指令键到其所有出现（按文件顺序）的映射。键以大写存储。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveSet {
    entries: BTreeMap<String, Vec<Occurrence>>,
}

impl DirectiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, value: impl Into<String>, line: usize) {
        self.entries
            .entry(key.to_ascii_uppercase())
            .or_default()
            .push(Occurrence {
                value: value.into(),
                line,
            });
    }

    pub fn get(&self, key: &str) -> Option<&[Occurrence]> {
        self.entries
            .get(&key.to_ascii_uppercase())
            .map(Vec::as_slice)
    }

    pub fn last(&self, key: &str) -> Option<&Occurrence> {
        self.get(key).and_then(<[Occurrence]>::last)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Occurrence])> {
        self.entries
            .iter()
            .map(|(key, occurrences)| (key.as_str(), occurrences.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// One named sub-test inside a test specification file.
/// 测试规范文件中的一个命名子测试。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubTestDeclaration {
    pub name: String,
    /// 1-based line of the `@test`/`@vector` marker.
    pub line: usize,
    pub directives: DirectiveSet,
    /// HDL generic parameters declared on a `@vector`, passed as `-gKEY=VALUE`.
    pub generics: BTreeMap<String, String>,
    /// Body lines, fed to standard input when no `INPUT` is given.
    pub body: Vec<String>,
}

impl SubTestDeclaration {
    fn new(name: String, line: usize) -> Self {
        Self {
            name,
            line,
            directives: DirectiveSet::new(),
            generics: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    /// The body as newline-terminated text, or `None` when there is no body.
    pub fn body_text(&self) -> Option<String> {
        if self.body.is_empty() {
            return None;
        }
        let mut text = self.body.join("\n");
        text.push('\n');
        Some(text)
    }
}

/// Parse result of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSpec {
    pub globals: DirectiveSet,
    pub tests: Vec<SubTestDeclaration>,
}

impl ParsedSpec {
    /// Environment-scoped keys that appear in directives, with their lines.
    /// Such keys are only honoured from the defaults and cohort layers.
    pub fn environment_directives(&self) -> Vec<(String, usize)> {
        let sets = std::iter::once(&self.globals).chain(self.tests.iter().map(|t| &t.directives));
        let mut found = Vec::new();
        for set in sets {
            for (key, occurrences) in set.iter() {
                let is_env = grammar::lookup(key).is_some_and(|spec| spec.scope == Scope::Environment);
                if is_env {
                    found.extend(occurrences.iter().map(|o| (key.to_string(), o.line)));
                }
            }
        }
        found.sort_by_key(|(_, line)| *line);
        found
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Marker {
    Mark,
    Test,
    Vector,
    With,
}

impl Marker {
    fn from_word(word: &str, kind: ToolchainKind) -> Option<Self> {
        match word {
            "mark" => Some(Self::Mark),
            "test" => Some(Self::Test),
            "vector" if kind == ToolchainKind::Hdl => Some(Self::Vector),
            "with" => Some(Self::With),
            _ => None,
        }
    }
}

/// Parses the directives of a test specification file.
///
/// The same text always yields the same `ParsedSpec`.
///
/// 解析测试规范文件的指令。相同的文本总是产生相同的 `ParsedSpec`。
pub fn parse(kind: ToolchainKind, text: &str) -> ParsedSpec {
    let leader = kind.comment_leader();
    let mut spec = ParsedSpec::default();
    // Set after a rejected declaration; its body and `@with` lines are dropped too.
    let mut orphaned = false;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let Some(rest) = raw.trim_start().strip_prefix(leader) else {
            continue;
        };

        if let Some(body) = rest.strip_prefix('|') {
            let body = body.strip_prefix(' ').unwrap_or(body);
            if orphaned {
                continue;
            }
            match spec.tests.last_mut() {
                Some(test) => test.body.push(body.trim_end_matches('\r').to_string()),
                None => debug!(line, "Body line before any sub-test declaration, ignored"),
            }
            continue;
        }

        let Some(directive) = rest.trim_start().strip_prefix('@') else {
            continue;
        };
        let (word, args) = directive
            .split_once(char::is_whitespace)
            .unwrap_or((directive, ""));
        let Some(marker) = Marker::from_word(word, kind) else {
            debug!(line, marker = word, "Unknown marker ignored");
            continue;
        };

        let mut tokens = split_tokens(args).into_iter();
        match marker {
            Marker::Mark => {
                for token in tokens {
                    apply_token(kind, &token, line, &mut spec.globals, None);
                }
            }
            Marker::Test | Marker::Vector => {
                let Some(name) = tokens.next().filter(|name| !name.contains('=')) else {
                    debug!(line, "Sub-test declaration without a name ignored");
                    orphaned = true;
                    continue;
                };
                orphaned = false;
                let mut decl = SubTestDeclaration::new(name, line);
                for token in tokens {
                    let generics = (marker == Marker::Vector).then_some(&mut decl.generics);
                    apply_token(kind, &token, line, &mut decl.directives, generics);
                }
                spec.tests.push(decl);
            }
            Marker::With if orphaned => {}
            Marker::With => match spec.tests.last_mut() {
                Some(test) => {
                    for token in tokens {
                        apply_token(kind, &token, line, &mut test.directives, None);
                    }
                }
                None => debug!(line, "@with before any sub-test declaration, ignored"),
            },
        }
    }

    spec
}

/// Splits a marker's arguments with shell-word rules, falling back to plain
/// whitespace when the quoting is unbalanced.
fn split_tokens(args: &str) -> Vec<String> {
    shlex::split(args).unwrap_or_else(|| args.split_whitespace().map(str::to_string).collect())
}

fn apply_token(
    kind: ToolchainKind,
    token: &str,
    line: usize,
    target: &mut DirectiveSet,
    generics: Option<&mut BTreeMap<String, String>>,
) {
    let (key, value) = token.split_once('=').unwrap_or((token, "true"));
    if !is_key(key) {
        debug!(line, token, "Malformed directive token ignored");
        return;
    }
    if grammar::recognised(kind, key).is_some() {
        target.push(key, value, line);
    } else if let Some(generics) = generics {
        generics.insert(key.to_string(), value.to_string());
    } else {
        debug!(line, key, "Unknown directive key ignored");
    }
}

fn is_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_key_means_true() {
        let spec = parse(ToolchainKind::Compiled, "//@mark LINT\n");
        assert_eq!(spec.globals.last("lint").map(|o| o.value.as_str()), Some("true"));
    }

    #[test]
    fn body_strips_one_leading_space() {
        let spec = parse(ToolchainKind::Script, "#@test t\n#|  two\n#|x\n");
        assert_eq!(spec.tests[0].body, vec![" two".to_string(), "x".to_string()]);
        assert_eq!(spec.tests[0].body_text().as_deref(), Some(" two\nx\n"));
    }

    #[test]
    fn declaration_starting_with_a_directive_is_dropped() {
        let text = "//@test first EXPECT=1\n//@test EXPECT=5\n//| lost\n//@with TIMEOUT=9\n//@test real EXPECT=5\n";
        let spec = parse(ToolchainKind::Compiled, text);
        let names: Vec<_> = spec.tests.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["first", "real"]);
        assert!(spec.tests[0].body.is_empty());
        assert!(spec.tests[0].directives.last("timeout").is_none());
    }

    #[test]
    fn unbalanced_quotes_fall_back_to_whitespace() {
        assert_eq!(split_tokens("A=\"x B=2"), vec!["A=\"x", "B=2"]);
    }

    #[test]
    fn key_shape() {
        assert!(is_key("CFLAGS"));
        assert!(is_key("_x1"));
        assert!(!is_key("1A"));
        assert!(!is_key(""));
    }
}
