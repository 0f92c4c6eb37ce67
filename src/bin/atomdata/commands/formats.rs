use std::io::{self, Write};

use anyhow::Result;

use crate::display::print_format_table;

pub fn run_formats() -> Result<()> {
    let mut stdout = io::stdout().lock();
    print_format_table(&mut stdout, atomdata::io::formats());
    stdout.flush()?;
    Ok(())
}
