//! Command-line tool: argument handling and the compression driver.

pub mod args;
pub mod display;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, IsTerminal};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::cli::args::Cli;
use crate::cli::display::set_display_level;
use crate::dictionary::load_dictionary;
use crate::displaylevel;
use crate::file::compress_stream;
use crate::frame::Framing;

/// Execute the parsed command line; returns the process exit code.
pub fn run(cli: Cli) -> i32 {
    set_display_level(match (cli.quiet, cli.verbose) {
        (q, _) if q > 0 => 1,
        (_, v) if v > 0 => 2 + v as u32,
        _ => 2,
    });

    match run_inner(&cli) {
        Ok(()) => 0,
        Err(err) => {
            displaylevel!(1, "ultraflate: {err:#}");
            1
        }
    }
}

fn run_inner(cli: &Cli) -> Result<()> {
    let framing = cli.format.framing();

    if cli.dictionary.is_some() && framing == Framing::Gzip {
        bail!("a preset dictionary cannot be used with gzip framing");
    }
    let dictionary = match &cli.dictionary {
        Some(path) => Some(
            load_dictionary(path).with_context(|| format!("reading dictionary {path}"))?,
        ),
        None => None,
    };

    if cli.output.is_some() && cli.files.len() > 1 {
        bail!("--output cannot be used with multiple input files");
    }

    if cli.files.is_empty() {
        return compress_stdin(cli, framing, dictionary.as_deref());
    }

    for path in &cli.files {
        compress_file(cli, path, framing, dictionary.as_deref())
            .with_context(|| format!("compressing {path}"))?;
    }
    Ok(())
}

fn compress_stdin(cli: &Cli, framing: Framing, dictionary: Option<&[u8]>) -> Result<()> {
    let stdout = io::stdout();
    if !cli.stdout && !cli.force && stdout.is_terminal() {
        bail!("refusing to write compressed data to a terminal (use -c or -F to force)");
    }

    let mut reader = BufReader::new(io::stdin().lock());
    let mut writer = BufWriter::new(stdout.lock());
    let (read, written) =
        compress_stream(&mut reader, &mut writer, framing, cli.block_size, dictionary)?;
    report("stdin", read, written);
    Ok(())
}

fn compress_file(cli: &Cli, path: &str, framing: Framing, dictionary: Option<&[u8]>) -> Result<()> {
    let mut reader = BufReader::new(File::open(path)?);

    if cli.stdout {
        let mut writer = BufWriter::new(io::stdout().lock());
        let (read, written) =
            compress_stream(&mut reader, &mut writer, framing, cli.block_size, dictionary)?;
        report(path, read, written);
        return Ok(());
    }

    let out_path = match &cli.output {
        Some(out) => out.clone(),
        None => format!("{path}.{}", cli.format.extension()),
    };
    if !cli.force && Path::new(&out_path).exists() {
        bail!("{out_path} already exists (use -F to overwrite)");
    }

    let mut writer = BufWriter::new(
        File::create(&out_path).with_context(|| format!("creating {out_path}"))?,
    );
    let (read, written) =
        compress_stream(&mut reader, &mut writer, framing, cli.block_size, dictionary)?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all().ok();
    report(path, read, written);

    if cli.rm {
        std::fs::remove_file(path).with_context(|| format!("removing {path}"))?;
    }
    Ok(())
}

/// Per-file result line at normal verbosity.
fn report(name: &str, read: u64, written: u64) {
    let ratio = if read > 0 {
        written as f64 * 100.0 / read as f64
    } else {
        0.0
    };
    displaylevel!(2, "{name:<24} {read:>12} -> {written:>12} ({ratio:>6.2}%)");
}
