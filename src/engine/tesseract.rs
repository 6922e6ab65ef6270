use super::{EngineDiag, ExtractError, OcrEngine};
use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// OCR through the `tesseract` command line tool.
///
/// The image is piped on stdin and the recognised text read from stdout, so
/// no temporary files are needed.
pub struct TesseractEngine {
    exe: PathBuf,
    lang: String,
    timeout: Duration,
}

impl TesseractEngine {
    pub fn new(cfg: &Config) -> Self {
        Self {
            exe: expand_tilde(&cfg.ocr.tesseract_exe),
            lang: cfg.ocr.lang.clone(),
            timeout: Duration::from_secs(cfg.ocr.timeout_seconds.max(1)),
        }
    }

    fn run(&self, args: &[&str], stdin_bytes: Option<&[u8]>) -> Result<Output> {
        debug!("tesseract run {:?} timeout={:?}", args, self.timeout);
        let mut cmd = Command::new(&self.exe);
        cmd.args(args);
        cmd.stdin(if stdin_bytes.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning {}", self.exe.display()))?;

        if let Some(bytes) = stdin_bytes {
            let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
            // tesseract may exit before reading everything when the image is unreadable
            if let Err(err) = stdin.write_all(bytes) {
                debug!("tesseract closed stdin early: {err}");
            }
        }

        wait_with_timeout(&mut child, self.timeout)
    }
}

impl OcrEngine for TesseractEngine {
    fn doctor(&self) -> Result<EngineDiag> {
        let executable = self.exe.display().to_string();
        match self.run(&["--version"], None) {
            Ok(out) if out.status.success() => {
                // tesseract 4 prints its version on stderr, 5 on stdout
                let banner = if out.stdout.is_empty() {
                    &out.stderr
                } else {
                    &out.stdout
                };
                let version = String::from_utf8_lossy(banner)
                    .lines()
                    .next()
                    .map(|l| l.trim().to_string());
                Ok(EngineDiag {
                    engine: "tesseract".into(),
                    executable,
                    version,
                    ok: true,
                    error: None,
                })
            }
            Ok(out) => Ok(EngineDiag {
                engine: "tesseract".into(),
                executable,
                version: None,
                ok: false,
                error: Some(String::from_utf8_lossy(&out.stderr).trim().to_string()),
            }),
            Err(err) => Ok(EngineDiag {
                engine: "tesseract".into(),
                executable,
                version: None,
                ok: false,
                error: Some(format!("{err:#}")),
            }),
        }
    }

    fn image_to_text(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let output = self
            .run(&["stdin", "stdout", "-l", self.lang.as_str()], Some(bytes))
            .map_err(|e| ExtractError::Ocr(format!("{e:#}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if looks_like_unreadable_image(&stderr) {
                return Err(ExtractError::CorruptImage);
            }
            return Err(ExtractError::Ocr(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn looks_like_unreadable_image(stderr: &str) -> bool {
    let s = stderr.to_ascii_lowercase();
    s.contains("read_image") || s.contains("unsupported image") || s.contains("can't read")
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    // Drain pipes while waiting so a chatty child can't block on a full buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("tesseract timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Err(anyhow!(
                "tesseract exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&stderr)
            ));
        }

        std::thread::sleep(Duration::from_millis(25));
    }
}
