//! `exiftool` integration.
//!
//! [`ExifTool`] keeps one `exiftool -stay_open True -@ -` process alive for the
//! whole run. Each request is a list of argument lines terminated by
//! `-execute`; the answer is everything printed on stdout up to the `{ready}`
//! marker. Dropping the session sends `-stay_open False` and waits for the
//! process to exit, so the process never outlives the run.
//!
//! Tags are read with `-j -n -G`: JSON output, numeric values (hemisphere
//! references and magnitudes are separate tags), group-qualified names.
//! exiftool's own diagnostics go straight to our stderr.

use super::backend::{MetadataReader, ToolError};
use super::run_tool;
use crate::metadata::RawTags;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::debug;

const EXIFTOOL: &str = "exiftool";

/// The marker exiftool prints after finishing each `-execute`.
const READY_MARKER: &str = "{ready";

/// Built-in `-p` template producing one GPX track from photo GPS tags.
pub const GPX_FORMAT: &str = r##"#------------------------------------------------------------------------------
# GPX track from photo GPS tags (photo-trail built-in template)
#------------------------------------------------------------------------------
#[HEAD]<?xml version="1.0" encoding="utf-8"?>
#[HEAD]<gpx version="1.0"
#[HEAD] creator="ExifTool $ExifToolVersion"
#[HEAD] xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
#[HEAD] xmlns="http://www.topografix.com/GPX/1/0"
#[HEAD] xsi:schemaLocation="http://www.topografix.com/GPX/1/0 http://www.topografix.com/GPX/1/0/gpx.xsd">
#[HEAD]<trk>
#[HEAD]<name>photos</name>
#[HEAD]<trkseg>
#[IF]  $gpslatitude $gpslongitude $gpsdatetime
#[BODY]<trkpt lat="$gpslatitude#" lon="$gpslongitude#">
#[BODY]  <ele>$gpsaltitude#</ele>
#[BODY]  <time>$gpsdatetime</time>
#[BODY]</trkpt>
#[TAIL]</trkseg>
#[TAIL]</trk>
#[TAIL]</gpx>
"##;

/// A running `exiftool -stay_open` session.
pub struct ExifTool {
    program: String,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ExifTool {
    /// Start a session using `exiftool` from `PATH`.
    pub fn start() -> Result<Self, ToolError> {
        Self::start_with(EXIFTOOL)
    }

    pub fn start_with(program: &str) -> Result<Self, ToolError> {
        let mut child = Command::new(program)
            .args(["-stay_open", "True", "-@", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                tool: program.to_string(),
                source,
            })?;

        let pipes = child.stdin.take().zip(child.stdout.take());
        let Some((stdin, stdout)) = pipes else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::Protocol {
                tool: program.to_string(),
                detail: "stdio pipes unavailable".into(),
            });
        };

        debug!(program, "started exiftool session");
        Ok(Self {
            program: program.to_string(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// Send one request and collect its stdout.
    fn execute(&mut self, args: &[String]) -> Result<String, ToolError> {
        for arg in args {
            writeln!(self.stdin, "{arg}")?;
        }
        writeln!(self.stdin, "-execute")?;
        self.stdin.flush()?;

        let mut output = String::new();
        loop {
            let mut line = String::new();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(ToolError::Protocol {
                    tool: self.program.clone(),
                    detail: "session ended before {ready}".into(),
                });
            }
            if line.trim_end().starts_with(READY_MARKER) {
                break;
            }
            output.push_str(&line);
        }
        Ok(output)
    }
}

impl MetadataReader for ExifTool {
    fn read_tags(&mut self, path: &Path, tags: &[&str]) -> Result<RawTags, ToolError> {
        let mut args: Vec<String> = ["-j", "-n", "-G", "-q"].map(String::from).to_vec();
        args.extend(tags.iter().map(|t| format!("-{t}")));
        args.push(path.to_string_lossy().into_owned());

        let output = self.execute(&args)?;
        parse_json_tags(&output).map_err(|detail| ToolError::Protocol {
            tool: self.program.clone(),
            detail,
        })
    }

    fn write_tags(
        &mut self,
        path: &Path,
        assignments: &[(&str, &str)],
    ) -> Result<(), ToolError> {
        let mut args: Vec<String> = ["-n", "-overwrite_original"].map(String::from).to_vec();
        args.extend(assignments.iter().map(|(tag, value)| format!("-{tag}={value}")));
        args.push(path.to_string_lossy().into_owned());

        let output = self.execute(&args)?;
        if output.contains("1 image files updated") || output.contains("1 image files unchanged")
        {
            Ok(())
        } else {
            Err(ToolError::Failed {
                tool: self.program.clone(),
                status: "write rejected".into(),
                stderr: output.trim().to_string(),
            })
        }
    }
}

impl Drop for ExifTool {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "-stay_open\nFalse");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
        debug!(program = %self.program, "closed exiftool session");
    }
}

/// Parse `exiftool -j -G` output for a single file.
///
/// An empty answer means exiftool could not read the file (it reported why
/// on stderr); that is an empty tag set, not a failure.
fn parse_json_tags(output: &str) -> Result<RawTags, String> {
    if output.trim().is_empty() {
        return Ok(RawTags::new());
    }
    let records: Vec<RawTags> = serde_json::from_str(output).map_err(|e| e.to_string())?;
    let mut tags = records.into_iter().next().unwrap_or_default();
    tags.remove("SourceFile");
    Ok(tags)
}

/// Render a GPX document from the GPS tags of every JPEG under `dirs`.
///
/// Points are ordered by GPS time. `format` is an exiftool `-p` template file
/// such as one written from [`GPX_FORMAT`].
pub fn render_gpx(dirs: &[PathBuf], format: &Path) -> Result<String, ToolError> {
    let mut args: Vec<String> = [
        "-r",
        "-q",
        "-fileOrder",
        "gpsdatetime",
        "-d",
        "%Y-%m-%dT%H:%M:%SZ",
        "-ext",
        "jpg",
        "-ext",
        "jpeg",
        "-p",
    ]
    .map(String::from)
    .to_vec();
    args.push(format.to_string_lossy().into_owned());
    args.extend(dirs.iter().map(|d| d.to_string_lossy().into_owned()));

    let stdout = run_tool(EXIFTOOL, &args)?;
    String::from_utf8(stdout).map_err(|e| ToolError::Protocol {
        tool: EXIFTOOL.to_string(),
        detail: e.to_string(),
    })
}
