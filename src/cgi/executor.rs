use crate::cgi::environment::CgiEnvironment;
use crate::cgi::watchdog::{kill_process_group, Watchdog};
use crate::config::ServerContext;
use crate::errors::CgiError;
use crate::fs::ResolvedPath;
use crate::http::request::HttpRequest;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long to wait for the output pipes to drain once the script has exited
const OUTPUT_GRACE: Duration = Duration::from_secs(1);

/// Longest `#!` line considered
const MAX_SHEBANG_LEN: u64 = 256;

/// Outcome of one script invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgiResult {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    /// Output went past the capture cap or did not finish draining
    pub truncated: bool,
}

impl CgiResult {
    pub fn success(&self) -> bool {
        !self.timed_out && !self.truncated && self.exit_code == Some(0)
    }
}

/// Runs CGI scripts for one server context. Holds no per-invocation state.
#[derive(Debug, Clone, Copy)]
pub struct CgiExecutor<'a> {
    ctx: &'a ServerContext,
}

impl<'a> CgiExecutor<'a> {
    pub fn new(ctx: &'a ServerContext) -> Self {
        CgiExecutor { ctx }
    }

    /// Run `script` with the configured timeout.
    pub fn run(&self, script: &ResolvedPath, request: &HttpRequest) -> Result<CgiResult, CgiError> {
        self.run_with_timeout(script, request, self.ctx.cgi_timeout())
    }

    pub fn run_with_timeout(
        &self,
        script: &ResolvedPath,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<CgiResult, CgiError> {
        let (program, args) = self.get_command_and_args(&script.absolute)?;

        let mut env = CgiEnvironment::from_request(request, script, self.ctx);
        env.add_system_env();

        let mut command = Command::new(&program);
        command
            .args(&args)
            .arg(&script.absolute)
            .env_clear()
            .envs(env.variables())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        if let Some(dir) = script.absolute.parent() {
            command.current_dir(dir);
        }

        let started = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|source| CgiError::Spawn { program: program.clone(), source })?;
        let watchdog = Watchdog::arm(child.id(), timeout);

        // Feed stdin from its own thread so a script that never reads it
        // cannot stall us; dropping the handle closes the pipe.
        if let Some(mut stdin) = child.stdin.take() {
            let body = request.body().to_vec();
            if !body.is_empty() {
                thread::spawn(move || {
                    if let Err(e) = stdin.write_all(&body) {
                        debug!(error = %e, "CGI script did not consume its request body");
                    }
                });
            }
        }

        let max_output = self.ctx.max_cgi_output();
        let stdout = Capture::spawn(child.stdout.take(), max_output);
        let stderr = Capture::spawn(child.stderr.take(), max_output);

        // The leader stays a zombie until reaped, so its pid still names the
        // group while the rest of it is killed.
        if let Err(source) = wait_exited(child.id()) {
            let _ = watchdog.disarm();
            kill_process_group(child.id());
            let _ = child.wait();
            return Err(CgiError::Wait { source });
        }
        let fired = watchdog.disarm();
        kill_process_group(child.id());

        let status = child.wait().map_err(|source| CgiError::Wait { source })?;
        let timed_out = killed_by_watchdog(fired, &status);

        let (stdout, stdout_truncated) = stdout.collect(OUTPUT_GRACE);
        let (stderr, _) = stderr.collect(OUTPUT_GRACE);

        debug!(
            script = %script.relative,
            exit_code = ?status.code(),
            timed_out,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "CGI script finished"
        );

        Ok(CgiResult {
            exit_code: status.code(),
            stdout,
            stderr,
            timed_out,
            truncated: stdout_truncated,
        })
    }

    /// Get command and arguments for executing the script. A `#!` line wins
    /// over the extension table.
    fn get_command_and_args(&self, script_path: &Path) -> Result<(String, Vec<String>), CgiError> {
        if let Ok(Some(shebang)) = read_shebang(script_path) {
            return Ok(shebang);
        }

        match self.ctx.interpreter_for(script_path) {
            Some(interpreter) => {
                let mut parts = interpreter.split_whitespace().map(str::to_string);
                let program = parts.next().ok_or_else(|| CgiError::NoInterpreter {
                    path: script_path.to_path_buf(),
                })?;
                Ok((program, parts.collect()))
            }
            None => Err(CgiError::NoInterpreter {
                path: script_path.to_path_buf(),
            }),
        }
    }
}

/// Block until `pid` has exited without reaping it.
fn wait_exited(pid: u32) -> io::Result<()> {
    let id = libc::id_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    loop {
        // SAFETY: siginfo_t is plain data and waitid only writes into it.
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::waitid(libc::P_PID, id, &mut info, libc::WEXITED | libc::WNOWAIT) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// The watchdog only counts as the cause of death if the script actually
/// died of its SIGKILL. A script that exited just as the deadline passed
/// keeps its own status.
fn killed_by_watchdog(fired: bool, status: &ExitStatus) -> bool {
    fired && status.signal() == Some(libc::SIGKILL)
}

/// Read shebang line from script: `#!/usr/bin/env python3 -u` gives
/// `("/usr/bin/env", ["python3", "-u"])`.
pub fn read_shebang(script_path: &Path) -> io::Result<Option<(String, Vec<String>)>> {
    let file = File::open(script_path)?;
    let mut reader = BufReader::new(file.take(MAX_SHEBANG_LEN));
    let mut first_line = Vec::new();
    reader.read_until(b'\n', &mut first_line)?;

    let Some(rest) = first_line.strip_prefix(b"#!") else {
        return Ok(None);
    };
    let Ok(line) = std::str::from_utf8(rest) else {
        return Ok(None);
    };

    let mut parts = line.split_whitespace().map(str::to_string);
    Ok(parts.next().map(|program| (program, parts.collect())))
}

/// Collects one output pipe on a helper thread, keeping at most `cap` bytes
/// and draining the rest so the script never blocks on a full pipe.
struct Capture {
    rx: mpsc::Receiver<(Vec<u8>, bool)>,
}

impl Capture {
    fn spawn<R: Read + Send + 'static>(reader: Option<R>, cap: usize) -> Self {
        let (tx, rx) = mpsc::channel();
        match reader {
            Some(mut reader) => {
                thread::spawn(move || {
                    let _ = tx.send(read_capped(&mut reader, cap));
                });
            }
            None => {
                let _ = tx.send((Vec::new(), false));
            }
        }
        Capture { rx }
    }

    /// Wait up to `grace` for the pipe to close. A descendant that kept the
    /// pipe open leaves the result marked truncated.
    fn collect(self, grace: Duration) -> (Vec<u8>, bool) {
        self.rx.recv_timeout(grace).unwrap_or_else(|_| (Vec::new(), true))
    }
}

fn read_capped<R: Read>(reader: &mut R, cap: usize) -> (Vec<u8>, bool) {
    let mut output = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;

    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let room = cap.saturating_sub(output.len());
                if n > room {
                    truncated = true;
                }
                output.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    (output, truncated)
}
