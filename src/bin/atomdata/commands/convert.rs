use std::io;

use anyhow::{Context, Result, anyhow};

use atomdata::{DumpOptions, Engine, FrameSelection, PostProcess, Record};

use super::{input_key, read_options, resolve};
use crate::cli::{ConvertArgs, RecordKind};
use crate::display::{Context as DisplayContext, Progress, RecordSummary, print_record_summary};
use crate::io::infer_output_format;
use crate::util::text::count;

const TOTAL_STEPS: u8 = 2;

pub fn run_convert(args: ConvertArgs, ctx: DisplayContext) -> Result<()> {
    let from = input_key(&args.input)?;
    let to = match &args.format {
        Some(key) => key.clone(),
        None => infer_output_format(&args.output)
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow!(
                    "Cannot infer the output format of '{}'; pass --to",
                    args.output.display()
                )
            })?,
    };

    let engine = Engine::builtin();
    resolve(&engine, &from)?;
    resolve(&engine, &to)?;

    let read = read_options(&args.input);
    let dump = dump_options(&args)?;
    let kind = args.input.kind;
    let source = &args.input.path;
    let destination = &args.output;
    let lower = args.dump.lower_triangular;

    let mut progress = Progress::new(ctx.interactive, TOTAL_STEPS);
    let read_step = format!("Reading {} ({from})", kind.describe());
    let write_step = format!("Writing {to}");
    let read_failed = || format!("Failed to read '{}' as {from}", source.display());
    let write_failed = || format!("Failed to write '{}' as {to}", destination.display());

    progress.step(&read_step);
    let summary = match kind {
        RecordKind::Plain => {
            let record = engine.load(source, &from, &read).with_context(read_failed)?;
            let record = normalize(record, lower)?;
            let summary = RecordSummary::plain(&record, &from);
            progress.complete_step(&read_step, &read_details(&summary));
            progress.step(&write_step);
            let frame = FrameSelection::from_index(args.dump.frame, record.frame_count())?;
            engine
                .dump(&record, destination, &to, frame, &dump)
                .with_context(write_failed)?;
            summary
        }
        RecordKind::Labeled => {
            let record = engine
                .load_labeled(source, &from, &read)
                .with_context(read_failed)?;
            let record = normalize(record, lower)?;
            let summary = RecordSummary::labeled(&record, &from);
            progress.complete_step(&read_step, &read_details(&summary));
            progress.step(&write_step);
            let frame = FrameSelection::from_index(args.dump.frame, record.frame_count())?;
            engine
                .dump_labeled(&record, destination, &to, frame, &dump)
                .with_context(write_failed)?;
            summary
        }
        RecordKind::BondOrder => {
            let record = engine
                .load_bond_order(source, &from, &read)
                .with_context(read_failed)?;
            let record = normalize(record, lower)?;
            let summary = RecordSummary::bond_order(&record, &from);
            progress.complete_step(&read_step, &read_details(&summary));
            progress.step(&write_step);
            let frame = FrameSelection::from_index(args.dump.frame, record.system.frame_count())?;
            engine
                .dump_bond_order(&record, destination, &to, frame, &dump)
                .with_context(write_failed)?;
            summary
        }
    };
    progress.complete_step(&write_step, &[destination.display().to_string()]);

    if ctx.interactive {
        print_record_summary(&mut io::stderr().lock(), &summary);
    }
    progress.finish("Conversion complete");
    Ok(())
}

/// Applies the caller-requested normalization steps to a loaded record.
fn normalize<R: Record>(record: R, lower_triangular: bool) -> Result<R> {
    if !lower_triangular {
        return Ok(record);
    }
    PostProcess::RotLowerTriangular
        .apply(record)
        .context("Failed to rotate cells to lower-triangular form")
}

fn dump_options(args: &ConvertArgs) -> Result<DumpOptions> {
    let mut options = match &args.dump.options {
        Some(path) => DumpOptions::load(path)
            .with_context(|| format!("Failed to load writer options from '{}'", path.display()))?,
        None => DumpOptions::default(),
    };
    if let Some(link) = args.dump.link {
        options.link = link.into();
    }
    Ok(options)
}

fn read_details(summary: &RecordSummary) -> Vec<String> {
    let species: Vec<&str> = summary.species.iter().map(|(name, _)| name.as_str()).collect();
    let mut details = vec![
        format!(
            "{}, {}",
            count(summary.atoms, "atom"),
            count(summary.frames, "frame")
        ),
        format!("Species: {}", species.join(" ")),
    ];
    if let Some(bonds) = summary.bonds {
        details.push(count(bonds, "bond"));
    }
    details
}
