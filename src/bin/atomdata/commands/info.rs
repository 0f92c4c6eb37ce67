use std::io::{self, Write};

use anyhow::{Context, Result};

use atomdata::Engine;

use super::{input_key, read_options, resolve};
use crate::cli::{InfoArgs, RecordKind};
use crate::display::{Context as DisplayContext, Progress, RecordSummary, print_record_summary};

pub fn run_info(args: InfoArgs, ctx: DisplayContext) -> Result<()> {
    let input = &args.input;
    let key = input_key(input)?;
    let engine = Engine::builtin();
    resolve(&engine, &key)?;
    let options = read_options(input);

    let mut progress = Progress::new(ctx.interactive, 1);
    progress.step(&format!("Reading {}", input.kind.describe()));
    let failed = || format!("Failed to read '{}' as {key}", input.path.display());
    let summary = match input.kind {
        RecordKind::Plain => {
            RecordSummary::plain(&engine.load(&input.path, &key, &options).with_context(failed)?, &key)
        }
        RecordKind::Labeled => RecordSummary::labeled(
            &engine
                .load_labeled(&input.path, &key, &options)
                .with_context(failed)?,
            &key,
        ),
        RecordKind::BondOrder => RecordSummary::bond_order(
            &engine
                .load_bond_order(&input.path, &key, &options)
                .with_context(failed)?,
            &key,
        ),
    };
    progress.complete_step(&format!("Reading {}", input.kind.describe()), &[]);
    progress.finish("Done");

    let mut stdout = io::stdout().lock();
    print_record_summary(&mut stdout, &summary);
    stdout.flush()?;
    Ok(())
}
