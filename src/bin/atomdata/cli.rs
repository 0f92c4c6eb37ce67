use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use atomdata::LinkMode;

#[derive(Parser)]
#[command(
    name = "atomdata",
    about = "Convert atomistic structure data between simulation-code file formats",
    version,
    author,
    before_help = crate::display::banner_for_help(),
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Read a structure record in one format and write it in another
    #[command(visible_alias = "c")]
    Convert(ConvertArgs),

    /// List the registered format keys and what each can read and write
    #[command(visible_alias = "f")]
    Formats,

    /// Summarize a structure record without converting it
    #[command(visible_alias = "i")]
    Info(InfoArgs),
}

impl Command {
    pub fn quiet(&self) -> bool {
        match self {
            Command::Convert(args) => args.input.quiet,
            Command::Info(args) => args.input.quiet,
            Command::Formats => true,
        }
    }
}

/// Input options shared by `convert` and `info`.
#[derive(Args)]
pub struct InputOptions {
    /// Input file or directory
    #[arg(value_name = "INPUT")]
    pub path: PathBuf,

    /// Input format key (inferred from the path if not specified)
    #[arg(id = "from", long = "from", value_name = "KEY")]
    pub format: Option<String>,

    /// Record kind to read
    #[arg(long, value_name = "KIND", default_value = "plain")]
    pub kind: RecordKind,

    /// Species names for numeric types, in type order (comma-separated)
    #[arg(long = "type-map", value_name = "NAMES", value_delimiter = ',')]
    pub type_map: Vec<String>,

    /// First trajectory frame to read
    #[arg(long, value_name = "N", default_value = "0")]
    pub begin: usize,

    /// Read every N-th trajectory frame
    #[arg(long, value_name = "N", default_value = "1")]
    pub step: usize,

    /// Suppress progress output (for scripting)
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub input: InputOptions,

    /// Output file or directory
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Output format key (inferred from the output path if not specified)
    #[arg(id = "to", long = "to", value_name = "KEY")]
    pub format: Option<String>,

    #[command(flatten)]
    pub dump: DumpArgs,
}

#[derive(Args)]
#[command(next_help_heading = "Output Options")]
pub struct DumpArgs {
    /// Frame to write; -1 writes every frame
    #[arg(
        long,
        value_name = "INDEX",
        default_value = "-1",
        allow_hyphen_values = true
    )]
    pub frame: i64,

    /// Writer options (TOML file with species masses, pseudopotentials, orbitals)
    #[arg(long, value_name = "FILE")]
    pub options: Option<PathBuf>,

    /// How referenced auxiliary files are placed next to the output
    #[arg(long, value_name = "MODE")]
    pub link: Option<LinkArg>,

    /// Rotate every frame so its cell is lower triangular before writing
    #[arg(long)]
    pub lower_triangular: bool,
}

#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub input: InputOptions,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecordKind {
    Plain,
    Labeled,
    #[value(name = "bond-order", alias = "bonds")]
    BondOrder,
}

impl RecordKind {
    pub fn describe(self) -> &'static str {
        match self {
            RecordKind::Plain => "structure",
            RecordKind::Labeled => "labeled structure",
            RecordKind::BondOrder => "bond-order structure",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LinkArg {
    None,
    Copy,
    Symlink,
}

impl From<LinkArg> for LinkMode {
    fn from(arg: LinkArg) -> Self {
        match arg {
            LinkArg::None => LinkMode::None,
            LinkArg::Copy => LinkMode::Copy,
            LinkArg::Symlink => LinkMode::Symlink,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn convert_accepts_negative_frame_and_type_map() {
        let cli = Cli::try_parse_from([
            "atomdata",
            "convert",
            "dump.lammpstrj",
            "-o",
            "out/STRU",
            "--frame",
            "-1",
            "--type-map",
            "Ta,Nb",
            "--link",
            "symlink",
        ])
        .unwrap();
        let Command::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.dump.frame, -1);
        assert_eq!(args.input.type_map, vec!["Ta", "Nb"]);
        assert!(matches!(args.dump.link, Some(LinkArg::Symlink)));
        assert!(args.input.kind == RecordKind::Plain);
        assert!(!args.dump.lower_triangular);
    }

    #[test]
    fn lower_triangular_flag_parses() {
        let cli = Cli::try_parse_from([
            "atomdata",
            "convert",
            "STRU",
            "-o",
            "set",
            "--to",
            "deepmd/raw",
            "--lower-triangular",
        ])
        .unwrap();
        let Command::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert!(args.dump.lower_triangular);
    }

    #[test]
    fn bond_order_kind_parses() {
        let cli = Cli::try_parse_from(["atomdata", "info", "x.sdf", "--kind", "bond-order"]).unwrap();
        let Command::Info(args) = cli.command else {
            panic!("expected info");
        };
        assert!(args.input.kind == RecordKind::BondOrder);
    }
}
