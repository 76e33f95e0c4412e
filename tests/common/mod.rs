// Shared test helpers for integration tests
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{TempDir, tempdir};
use tokio_util::sync::CancellationToken;

use automark::core::engine::RunSummary;
use automark::core::{ConfigStore, Engine, OutcomeKind, Submission, SubTestReport};

/// A scratch layout: `tools/` holds fake executables, `tests/` the test
/// specification files and `submission/` the student's code.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempdir().expect("Failed to create temporary directory");
        for sub in ["tools", "tests", "submission", "builds"] {
            fs::create_dir_all(dir.path().join(sub)).expect("Failed to create workspace directory");
        }
        Self { dir }
    }

    pub fn tools(&self) -> PathBuf {
        self.dir.path().join("tools")
    }

    pub fn submission_root(&self) -> PathBuf {
        self.dir.path().join("submission")
    }

    pub fn build_root(&self) -> PathBuf {
        self.dir.path().join("builds")
    }

    pub fn write_test(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join("tests").join(name);
        fs::write(&path, content).expect("Failed to write test specification");
        path
    }

    pub fn write_student(&self, name: &str, content: &str) -> PathBuf {
        let path = self.submission_root().join(name);
        fs::write(&path, content).expect("Failed to write student source");
        path
    }

    pub fn submission(&self) -> Submission {
        Submission::new("alice", self.submission_root())
    }

    /// Lines the fake tool `tool` appended to its log.
    pub fn log_lines(&self, tool: &str) -> Vec<String> {
        fs::read_to_string(self.tools().join(format!("{tool}.log")))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// A store whose cohort layer points the named tool keys at files in `tools/`.
    pub fn store(&self, tools: &[(&str, &PathBuf)]) -> ConfigStore {
        let mut store = ConfigStore::default();
        for (key, path) in tools {
            store.set_cohort(key, (*path).clone());
        }
        store.set_cohort("BUILD_ROOT", self.build_root());
        store
    }
}

/// Writes an executable shell script.
pub fn write_script(path: &Path, body: &str) -> PathBuf {
    fs::write(path, body).expect("Failed to write script");
    let mut perms = fs::metadata(path).expect("Failed to stat script").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("Failed to chmod script");
    path.to_path_buf()
}

/// A stand-in C compiler. It reads the generated `student.h`, rejects any
/// source containing `#error`, and otherwise "links" a shell script made of the
/// `//sh: ` lines of the student sources followed by those of the test file.
pub fn fake_cc(ws: &Workspace) -> PathBuf {
    write_script(
        &ws.tools().join("cc"),
        r#"#!/bin/sh
here=$(dirname "$0")
echo "cc $*" >> "$here/cc.log"
out=""
units=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  case "$arg" in *.c) units="$units $arg" ;; esac
  prev="$arg"
done
sources=$(sed -n 's/^#include "\(.*\)"$/\1/p' student.h)
for f in $sources $units; do
  if grep -q '#error' "$f"; then
    echo "$f:1:2: error: #error student code does not compile" >&2
    exit 1
  fi
done
{
  echo '#!/bin/sh'
  for f in $sources $units; do sed -n 's|^//sh: ||p' "$f"; done
} > "$out"
chmod 755 "$out"
"#,
    )
}

/// A stand-in `clang-tidy` that reports `warnings` per source file.
pub fn fake_clang_tidy(ws: &Workspace, warnings: u32) -> PathBuf {
    write_script(
        &ws.tools().join("clang-tidy"),
        &format!(
            "#!/bin/sh\necho \"tidy $*\" >> \"$(dirname \"$0\")/tidy.log\"\necho \"{warnings} warnings generated.\" >&2\n"
        ),
    )
}

/// A stand-in `ghdl`. Analysis fails on units containing `BROKEN`; a run
/// checks the `A + B = SUM` generics and reports an assertion error on mismatch.
pub fn fake_ghdl(ws: &Workspace) -> PathBuf {
    write_script(
        &ws.tools().join("ghdl"),
        r#"#!/bin/sh
here=$(dirname "$0")
echo "ghdl $*" >> "$here/ghdl.log"
for last; do :; done
case "$1" in
  -a)
    if grep -q BROKEN "$last"; then
      echo "$last:1:1: syntax error" >&2
      exit 1
    fi
    ;;
  -e)
    ;;
  -r)
    a=0; b=0; sum=0
    for arg in "$@"; do
      case "$arg" in
        -gA=*) a=${arg#-gA=} ;;
        -gB=*) b=${arg#-gB=} ;;
        -gSUM=*) sum=${arg#-gSUM=} ;;
      esac
    done
    if [ $((a + b)) -eq "$sum" ]; then
      echo "adder_tb.vhd:30:5:@10ns:(report note): vector ok"
    else
      echo "adder_tb.vhd:28:5:@10ns:(assertion error): sum mismatch"
      exit 1
    fi
    ;;
esac
"#,
    )
}

/// Collects `path` and executes every sub-test in parallel.
pub async fn run_file(engine: Engine, path: &Path) -> RunSummary {
    let engine = Arc::new(engine);
    let collected = engine.collect(path).expect("Failed to collect test file");
    engine
        .execute_all(collected.items, 4, &CancellationToken::new())
        .await
}

pub fn outcome_of(summary: &RunSummary, name: &str) -> OutcomeKind {
    report_of(summary, name).outcome
}

pub fn report_of<'a>(summary: &'a RunSummary, name: &str) -> &'a SubTestReport {
    summary
        .reports
        .iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| panic!("no report for {name}: {:?}", summary.reports))
}

/// Whether a real executable is available, for tests that need one.
pub fn have(tool: &str) -> bool {
    automark::infra::fs::find_executable(tool, &[]).is_some()
}
