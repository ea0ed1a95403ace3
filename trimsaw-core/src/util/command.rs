//! Child-process helpers shared by the probe and transcode layers.
//!
//! Both entry points map a missing binary to `ToolUnavailable` and a
//! non-zero exit to `CommandFailed` with the captured stderr text.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Output, Stdio};
use std::sync::mpsc;
use std::thread;

use crate::error::{CoreResult, command_failed_error, command_start_error};

/// Runs a command to completion, capturing stdout and stderr.
pub fn run_command(tool: &str, cmd: &mut Command) -> CoreResult<Output> {
    log::debug!("running {cmd:?}");
    let output = cmd.output().map_err(|e| command_start_error(tool, e))?;
    if !output.status.success() {
        return Err(command_failed_error(tool, output.status, &output.stderr));
    }
    Ok(output)
}

#[derive(Debug, Clone, Copy)]
enum LineSource {
    Stdout,
    Stderr,
}

/// Runs a command while feeding every output line, from either pipe, to
/// `on_line` as it arrives. The output is never buffered as a data channel;
/// the collected text is kept only for error reporting.
pub fn run_command_streaming<F>(tool: &str, cmd: &mut Command, mut on_line: F) -> CoreResult<Output>
where
    F: FnMut(&str),
{
    log::debug!("running {cmd:?}");
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| command_start_error(tool, e))?;

    let (tx, rx) = mpsc::channel::<(LineSource, String)>();
    let mut readers = Vec::new();
    if let Some(pipe) = child.stdout.take() {
        readers.push(spawn_line_reader(pipe, LineSource::Stdout, tx.clone()));
    }
    if let Some(pipe) = child.stderr.take() {
        readers.push(spawn_line_reader(pipe, LineSource::Stderr, tx.clone()));
    }
    drop(tx);

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    for (source, line) in rx {
        on_line(&line);
        let buf = match source {
            LineSource::Stdout => &mut stdout,
            LineSource::Stderr => &mut stderr,
        };
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
    }
    for reader in readers {
        let _ = reader.join();
    }

    let status = child.wait()?;
    if !status.success() {
        return Err(command_failed_error(tool, status, &stderr));
    }
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

fn spawn_line_reader<R>(
    pipe: R,
    source: LineSource,
    tx: mpsc::Sender<(LineSource, String)>,
) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.send((source, line)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    })
}

/// Extracts the frame counter from an ffmpeg status line such as
/// `frame=  128 fps= 64 q=31.0 size=512kB ...`.
pub fn parse_frame_marker(line: &str) -> Option<u64> {
    let rest = line.split_once("frame=")?.1;
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
