mod convert;
mod formats;
mod info;

use anyhow::{Context, Result, anyhow};

use atomdata::{Engine, ReadOptions};

use crate::cli::{Command, InputOptions};
use crate::display::Context as DisplayContext;
use crate::io::infer_input_format;

pub fn dispatch(command: Command, ctx: DisplayContext) -> Result<()> {
    match command {
        Command::Convert(args) => convert::run_convert(args, ctx),
        Command::Formats => formats::run_formats(),
        Command::Info(args) => info::run_info(args, ctx),
    }
}

/// Input format key, from `--from` or the input path.
fn input_key(input: &InputOptions) -> Result<String> {
    match &input.format {
        Some(key) => Ok(key.clone()),
        None => infer_input_format(&input.path)
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow!(
                    "Cannot infer the input format of '{}'; pass --from",
                    input.path.display()
                )
            }),
    }
}

fn read_options(input: &InputOptions) -> ReadOptions {
    let mut options = ReadOptions {
        begin: input.begin,
        step: input.step,
        ..ReadOptions::default()
    };
    if !input.type_map.is_empty() {
        options = options.with_type_map(input.type_map.iter().cloned());
    }
    options
}

/// Checks the key against the registry before any file is touched.
fn resolve(engine: &Engine<'_>, key: &str) -> Result<()> {
    engine
        .registry()
        .resolve(key)
        .map(|_| ())
        .with_context(|| format!("Format '{key}' is not available"))
}
