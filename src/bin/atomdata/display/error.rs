use std::io::{self, Write};

use anyhow::Error;
use atomdata::{Capability, Error as DataError};

use crate::util::text::wrap;

#[rustfmt::skip]
pub fn print_error(err: &Error) {
    let mut stderr = io::stderr().lock();

    let _ = writeln!(stderr);
    let _ = writeln!(stderr, "   ╔══════════════════════════════════════════════════════════════╗");
    let _ = writeln!(stderr, "   ║  ✗ Error                                                     ║");
    let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");

    for line in wrap(&err.to_string(), 59) {
        let _ = writeln!(stderr, "   ║  {:<59} ║", line);
    }

    let mut source = err.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Caused by:                                                  ║");
        for line in wrap(&cause.to_string(), 57) {
            let _ = writeln!(stderr, "   ║    {:<57} ║", line);
        }
        source = cause.source();
    }

    let hints = hints_for(err);
    if !hints.is_empty() {
        let _ = writeln!(stderr, "   ╟──────────────────────────────────────────────────────────────╢");
        let _ = writeln!(stderr, "   ║  Hints:                                                      ║");
        for hint in hints {
            let wrapped = wrap(&hint, 55);
            if let Some((first, rest)) = wrapped.split_first() {
                let _ = writeln!(stderr, "   ║    • {:<55} ║", first);
                for line in rest {
                    let _ = writeln!(stderr, "   ║      {:<55} ║", line);
                }
            }
        }
    }

    let _ = writeln!(stderr, "   ╚══════════════════════════════════════════════════════════════╝");
    let _ = writeln!(stderr);
}

fn hints_for(err: &Error) -> Vec<String> {
    match err.chain().find_map(|cause| cause.downcast_ref::<DataError>()) {
        Some(data_err) => data_hints(data_err),
        None => fallback_hints(&err.to_string()),
    }
}

fn data_hints(err: &DataError) -> Vec<String> {
    let mut hints = Vec::new();
    match err {
        DataError::UnknownKey { kind: "driver", .. } => {
            hints.push("Built-in drivers: harmonic, hybrid".into());
        }
        DataError::UnknownKey { .. } => {
            hints.push("Run 'atomdata formats' to list every registered format key".into());
        }
        DataError::UnsupportedCapability { capability, .. } => {
            hints.push("Run 'atomdata formats' to see what each format can read and write".into());
            match capability {
                Capability::ReadPlain | Capability::WritePlain => {
                    hints.push("Try --kind labeled or --kind bond-order if the format carries labels or bonds".into());
                }
                Capability::ReadLabeled | Capability::WriteLabeled => {
                    hints.push("Use --kind plain to convert geometry without energies and forces".into());
                }
                Capability::ReadBondOrder | Capability::WriteBondOrder => {
                    hints.push("Bond graphs are only carried by sdf and mol files".into());
                }
            }
        }
        DataError::FrameIndexOutOfRange { frame_count, .. } => {
            hints.push(format!("Valid frames are 0..{frame_count}; use --frame -1 to write all of them"));
        }
        DataError::ShapeMismatch(_) => {
            hints.push("Every frame must list the same atoms in the same order".into());
            hints.push("Check that label files hold one row per frame".into());
        }
        DataError::MalformedLine { .. } => {
            hints.push("Atom lines are: x y z [m1 m2 m3] then keyword groups mag, v, angle1, angle2, sc, lambda".into());
            hints.push("Move flags must be the literal tokens 0 or 1".into());
        }
        DataError::MissingAuxFile(_) => {
            hints.push("Paths in the writer options are resolved from the working directory".into());
            hints.push("Use --link none to reference the files without touching them".into());
        }
        DataError::NotImplemented { .. } => {
            hints.push("Combine drivers with 'hybrid' to supply the missing label".into());
        }
        DataError::Io { source } => {
            use std::io::ErrorKind;
            match source.kind() {
                ErrorKind::NotFound => hints.push("Check that the input path exists".into()),
                ErrorKind::PermissionDenied => {
                    hints.push("Check read/write permissions of the input and output paths".into())
                }
                ErrorKind::AlreadyExists => {
                    hints.push("Remove the existing output or choose another path".into())
                }
                _ => hints.push("An operating-system level I/O error occurred".into()),
            }
        }
        DataError::Parse { format, line, .. } => {
            hints.push(format!("Inspect the {format} input around line {line}"));
            hints.push("Pass --from explicitly if the format was guessed from the file name".into());
        }
        DataError::Config(_) => {
            hints.push("Writer options take [species.<name>] tables with mass, pseudopotential and orbital".into());
        }
        DataError::Conversion(msg) => {
            let lower = msg.to_lowercase();
            if lower.contains("species") {
                hints.push("Give every species an entry in the --options file, or none at all".into());
            } else if lower.contains("frame") {
                hints.push("Select a single frame with --frame".into());
            } else {
                hints.push("The target format cannot represent this record".into());
            }
        }
    }
    hints
}

fn fallback_hints(msg: &str) -> Vec<String> {
    let lower = msg.to_lowercase();
    if lower.contains("format") {
        vec!["Pass --from or --to with a key from 'atomdata formats'".into()]
    } else {
        Vec::new()
    }
}
