use std::path::Path;

/// Guesses the format key of an existing input path.
pub fn input(path: &Path) -> Option<&'static str> {
    if path.is_dir() {
        return path.join("type.raw").is_file().then_some("deepmd/raw");
    }
    by_name(path)
}

/// Guesses the format key of an output path that may not exist yet.
pub fn output(path: &Path) -> Option<&'static str> {
    if path.is_dir() && path.join("type.raw").is_file() {
        return Some("deepmd/raw");
    }
    by_name(path)
}

fn by_name(path: &Path) -> Option<&'static str> {
    let name = path.file_name()?.to_str()?;
    if name.eq_ignore_ascii_case("STRU") {
        return Some("stru");
    }
    if name.starts_with("dump.") {
        return Some("lammps/dump");
    }
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "stru" => Some("stru"),
        "sdf" | "sd" => Some("sdf"),
        "mol" => Some("mol"),
        "dump" | "lammpstrj" => Some("lammps/dump"),
        _ => None,
    }
}
