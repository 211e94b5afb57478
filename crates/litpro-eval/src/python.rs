//! `python`: cells run by an external Python interpreter.
//!
//! Every cell gets a fresh interpreter process. The environment goes in on
//! stdin as JSON, the snippet is `exec`'d with stdout captured, and every
//! JSON-representable top-level name comes back as a binding. Anything else
//! (functions, modules, open files) stays behind in the exited process, as do
//! values holding integers outside the 64-bit range.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use litpro_core::{Environment, EvalFailure, Evaluation, Evaluator};
use serde::{Deserialize, Serialize};

/// Environment variable naming the interpreter to use.
pub const PYTHON_ENV_VAR: &str = "LITPRO_PYTHON";

/// Python evaluator configuration.
#[derive(Debug, Clone)]
pub struct PythonConfig {
    /// Interpreter path; `None` searches `LITPRO_PYTHON`, then `python3` and `python` on PATH
    pub interpreter: Option<PathBuf>,
    /// Per-cell deadline; the process is killed when it expires
    pub timeout: Option<Duration>,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            interpreter: None,
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

const HARNESS: &str = r#"
import contextlib, io, json, sys, traceback

def fits(value):
    if isinstance(value, bool):
        return True
    if isinstance(value, int):
        return -(2 ** 63) <= value < 2 ** 63
    if isinstance(value, (list, tuple)):
        return all(fits(item) for item in value)
    if isinstance(value, dict):
        return all(fits(item) for item in value.values())
    return True

request = json.load(sys.stdin)
scope = dict(request["env"])
scope["__name__"] = "__main__"
captured = io.StringIO()
try:
    code = compile(request["source"], "<cell>", "exec")
    with contextlib.redirect_stdout(captured):
        exec(code, scope)
except SyntaxError as exc:
    result = {"ok": False, "message": "SyntaxError: %s" % exc.msg, "line": exc.lineno}
except BaseException as exc:
    line = None
    for frame in traceback.extract_tb(exc.__traceback__):
        if frame.filename == "<cell>":
            line = frame.lineno
    result = {"ok": False, "message": "%s: %s" % (type(exc).__name__, exc), "line": line}
else:
    bindings = {}
    dropped = []
    for name, value in scope.items():
        if name.startswith("__"):
            continue
        try:
            json.dumps(value, allow_nan=False)
        except (TypeError, ValueError):
            continue
        if not fits(value):
            dropped.append(name)
            continue
        bindings[name] = value
    result = {"ok": True, "bindings": bindings, "dropped": dropped}
result["output"] = captured.getvalue()
sys.stdout.write(json.dumps(result))
"#;

#[derive(Serialize)]
struct Request<'a> {
    env: &'a Environment,
    source: &'a str,
}

#[derive(Deserialize)]
struct Response {
    ok: bool,
    #[serde(default)]
    output: String,
    #[serde(default)]
    bindings: Environment,
    #[serde(default)]
    message: String,
    #[serde(default)]
    line: Option<usize>,
    /// Names left out because an integer in them does not fit in 64 bits
    #[serde(default)]
    dropped: Vec<String>,
}

/// Evaluator for `python` cells.
#[derive(Debug, Clone, Default)]
pub struct PythonEvaluator {
    config: PythonConfig,
}

impl PythonEvaluator {
    pub fn new(config: PythonConfig) -> Self {
        Self { config }
    }

    /// Find the interpreter binary.
    ///
    /// Looks in the following order:
    /// 1. `PythonConfig::interpreter`
    /// 2. `LITPRO_PYTHON` environment variable
    /// 3. `python3` then `python` on the system PATH
    pub fn find_interpreter(&self) -> Result<PathBuf, EvalFailure> {
        if let Some(ref path) = self.config.interpreter {
            return Ok(path.clone());
        }

        if let Ok(path) = std::env::var(PYTHON_ENV_VAR)
            && !path.trim().is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        for name in ["python3", "python"] {
            if let Ok(path) = which::which(name) {
                return Ok(path);
            }
        }

        Err(EvalFailure::new(format!(
            "no python interpreter found; install python3 or set {}",
            PYTHON_ENV_VAR
        )))
    }

    fn run(&self, source: &str, env: &Environment) -> Result<Response, EvalFailure> {
        let interpreter = self.find_interpreter()?;
        let request = serde_json::to_vec(&Request { env, source })
            .map_err(|e| EvalFailure::new(format!("failed to encode environment: {}", e)))?;

        let mut child = Command::new(&interpreter)
            .arg("-c")
            .arg(HARNESS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                EvalFailure::new(format!(
                    "failed to start python interpreter '{}': {}",
                    interpreter.display(),
                    e
                ))
            })?;
        tracing::debug!("Spawned {} (pid {})", interpreter.display(), child.id());

        let stdin = child.stdin.take();
        let writer = thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                // The harness reads all of stdin before running; a closed pipe
                // means it died early and the exit status reports why.
                let _ = stdin.write_all(&request);
            }
        });
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => return Err(EvalFailure::new(format!("failed to wait for python: {}", e))),
            }
            if let Some(timeout) = self.config.timeout
                && started.elapsed() >= timeout
            {
                if let Err(e) = child.kill() {
                    tracing::warn!("Failed to kill python process: {}", e);
                }
                let _ = child.wait();
                return Err(EvalFailure::new(format!(
                    "cell timed out after {:.1}s",
                    timeout.as_secs_f64()
                )));
            }
            thread::sleep(Duration::from_millis(10));
        };

        let _ = writer.join();
        let stdout = stdout.map(join_reader).unwrap_or_default();
        let stderr = stderr.map(join_reader).unwrap_or_default();

        if !stderr.trim().is_empty() {
            tracing::debug!("python stderr: {}", stderr.trim_end());
        }

        serde_json::from_str::<Response>(&stdout).map_err(|_| {
            let detail = stderr.trim();
            EvalFailure::new(if detail.is_empty() {
                format!("python exited with {} without a result", status)
            } else {
                format!("python exited with {}: {}", status, detail)
            })
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        let _ = pipe.read_to_string(&mut buf);
        buf
    })
}

fn join_reader(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

impl Evaluator for PythonEvaluator {
    fn languages(&self) -> Vec<String> {
        vec!["python".to_string(), "py".to_string(), "python3".to_string()]
    }

    fn evaluate(
        &self,
        source: &str,
        _language: &str,
        env: &Environment,
    ) -> Result<Evaluation, EvalFailure> {
        let response = self.run(source, env)?;
        for name in &response.dropped {
            tracing::warn!(
                "python binding '{}' holds an integer outside the 64-bit range; not carried forward",
                name
            );
        }
        if response.ok {
            Ok(Evaluation::new(response.output, response.bindings))
        } else {
            Err(EvalFailure {
                message: response.message,
                line: response.line,
            })
        }
    }
}
