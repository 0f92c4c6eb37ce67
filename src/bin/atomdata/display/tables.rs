use std::io::Write;

use atomdata::{BondOrder, BondOrderSystem, FormatRegistry, LabeledSystem, Mat3, System};

use crate::util::text::truncate;

const INDENT: &str = "      ";

const BOX_INNER_WIDTH: usize = 62;
const SAFE_TABLE_WIDTH: usize = BOX_INNER_WIDTH - INDENT.len();

/// What `info` and `convert` report about a record.
pub struct RecordSummary {
    pub kind: &'static str,
    pub format: String,
    pub atoms: usize,
    pub frames: usize,
    pub species: Vec<(String, usize)>,
    pub cell: Option<Mat3>,
    pub extensions: Vec<String>,
    pub virials: Option<bool>,
    pub bonds: Option<usize>,
    pub bond_orders: Vec<(String, usize)>,
    pub net_charge: Option<i32>,
}

impl RecordSummary {
    pub fn plain(system: &System, format: &str) -> Self {
        Self {
            kind: "structure",
            format: format.to_string(),
            atoms: system.atom_count(),
            frames: system.frame_count(),
            species: system
                .species_names
                .iter()
                .cloned()
                .zip(system.species_counts.iter().copied())
                .collect(),
            cell: system.cell(0).copied(),
            extensions: system.extensions.names().map(str::to_string).collect(),
            virials: None,
            bonds: None,
            bond_orders: Vec::new(),
            net_charge: None,
        }
    }

    pub fn labeled(record: &LabeledSystem, format: &str) -> Self {
        Self {
            kind: "labeled structure",
            virials: Some(record.has_virials()),
            ..Self::plain(&record.system, format)
        }
    }

    pub fn bond_order(record: &BondOrderSystem, format: &str) -> Self {
        Self {
            kind: "bond-order structure",
            bonds: Some(record.bond_count()),
            bond_orders: bond_order_counts(record),
            net_charge: Some(record.net_charge()),
            ..Self::plain(&record.system, format)
        }
    }
}

pub fn print_record_summary(out: &mut impl Write, summary: &RecordSummary) {
    let mut rows = vec![
        ("Format", summary.format.clone()),
        ("Record", summary.kind.to_string()),
        ("Atoms", summary.atoms.to_string()),
        ("Frames", summary.frames.to_string()),
        ("Species", summary.species.len().to_string()),
    ];

    match &summary.cell {
        Some(cell) => {
            let (a, b, c) = (vec_len(&cell[0]), vec_len(&cell[1]), vec_len(&cell[2]));
            rows.push(("Cell (Å)", format!("{a:.3} × {b:.3} × {c:.3}")));
            let (alpha, beta, gamma) = calc_angles(cell);
            rows.push((
                "Angles (α β γ)",
                format!("{alpha:.1}° {beta:.1}° {gamma:.1}°"),
            ));
        }
        None => rows.push(("Cell", "non-periodic".to_string())),
    }
    if let Some(virials) = summary.virials {
        rows.push(("Virials", if virials { "yes" } else { "no" }.to_string()));
    }
    if let Some(bonds) = summary.bonds {
        rows.push(("Bonds", bonds.to_string()));
    }
    if let Some(charge) = summary.net_charge {
        rows.push(("Net charge", format!("{charge:+}")));
    }
    if !summary.extensions.is_empty() {
        rows.push(("Extra fields", summary.extensions.join(", ")));
    }

    print_kv_table(out, "Record Summary", &rows);
    print_distribution_table(out, "Species", &summary.species, summary.atoms);
    if let Some(bonds) = summary.bonds
        && bonds > 0
    {
        print_distribution_table(out, "Bond Orders", &summary.bond_orders, bonds);
    }
}

fn bond_order_counts(record: &BondOrderSystem) -> Vec<(String, usize)> {
    let mut counts: Vec<(BondOrder, usize)> = Vec::new();
    for bond in &record.bonds {
        match counts.iter_mut().find(|(order, _)| *order == bond.order) {
            Some((_, n)) => *n += 1,
            None => counts.push((bond.order, 1)),
        }
    }
    counts
        .into_iter()
        .map(|(order, n)| (order.to_string(), n))
        .collect()
}

/// One row per registered key with the converter name and capabilities.
pub fn print_format_table(out: &mut impl Write, registry: &FormatRegistry) {
    let rows: Vec<(String, String, String)> = registry
        .keys()
        .into_iter()
        .filter_map(|key| {
            let converter = registry.resolve(key).ok()?;
            Some((
                key.to_string(),
                converter.name().to_string(),
                converter.capabilities().to_string(),
            ))
        })
        .collect();

    let width = |pick: fn(&(String, String, String)) -> &String, header: &str| {
        rows.iter()
            .map(|r| pick(r).chars().count())
            .chain([header.len()])
            .max()
            .unwrap_or(0)
    };
    let key_w = width(|r| &r.0, "Key");
    let name_w = width(|r| &r.1, "Converter");
    let cap_w = width(|r| &r.2, "Capabilities");

    let line = |left: &str, mid: &str, right: &str| {
        format!(
            "{left}{}{mid}{}{mid}{}{right}",
            "─".repeat(key_w + 2),
            "─".repeat(name_w + 2),
            "─".repeat(cap_w + 2)
        )
    };

    let _ = writeln!(out, "{}", line("┌", "┬", "┐"));
    let _ = writeln!(
        out,
        "│ {:<key_w$} │ {:<name_w$} │ {:<cap_w$} │",
        "Key", "Converter", "Capabilities"
    );
    let _ = writeln!(out, "{}", line("├", "┼", "┤"));
    for (key, name, caps) in &rows {
        let _ = writeln!(out, "│ {key:<key_w$} │ {name:<name_w$} │ {caps:<cap_w$} │");
    }
    let _ = writeln!(out, "{}", line("└", "┴", "┘"));
}

fn print_distribution_table(out: &mut impl Write, title: &str, data: &[(String, usize)], total: usize) {
    let name_w = 10usize;
    let count_w = 8usize;
    let sep_overhead = 6;
    let dist_w = SAFE_TABLE_WIDTH.saturating_sub(name_w + count_w + sep_overhead);
    let max_bar_width = dist_w.saturating_sub(8).min(20);

    let border = |left: &str, mid: &str, right: &str| {
        format!(
            "{INDENT}{left}{}{mid}{}{mid}{}{right}",
            "─".repeat(name_w + 2),
            "─".repeat(count_w + 2),
            "─".repeat(dist_w + 2)
        )
    };

    let _ = writeln!(out, "{INDENT}┌─ {} ─┐", truncate(title, SAFE_TABLE_WIDTH - 6));
    let _ = writeln!(out, "{}", border("┌", "┬", "┐"));
    let _ = writeln!(
        out,
        "{INDENT}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
        "Species", "Atoms", "Distribution"
    );
    let _ = writeln!(out, "{}", border("├", "┼", "┤"));

    for (name, count) in data.iter().take(15) {
        let pct = if total == 0 {
            0.0
        } else {
            (*count as f64 / total as f64) * 100.0
        };
        let dist_cell = format!("{}  {:>5.1}%", make_bar(pct, max_bar_width), pct);
        let _ = writeln!(
            out,
            "{INDENT}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
            truncate(name, name_w),
            count,
            dist_cell
        );
    }
    if data.len() > 15 {
        let _ = writeln!(
            out,
            "{INDENT}│ {:<name_w$} │ {:>count_w$} │ {:<dist_w$} │",
            "...",
            "...",
            format!("({} more species)", data.len() - 15)
        );
    }

    let _ = writeln!(out, "{}", border("└", "┴", "┘"));
}

fn print_kv_table(out: &mut impl Write, title: &str, rows: &[(&str, String)]) {
    let key_w = 16usize;
    let sep_overhead = 6;
    let val_w = SAFE_TABLE_WIDTH.saturating_sub(key_w + sep_overhead);

    let border = |left: &str, mid: &str, right: &str| {
        format!(
            "{INDENT}{left}{}{mid}{}{right}",
            "─".repeat(key_w + 2),
            "─".repeat(val_w + 2)
        )
    };

    let _ = writeln!(out, "{INDENT}┌─ {} ─┐", truncate(title, SAFE_TABLE_WIDTH - 6));
    let _ = writeln!(out, "{}", border("┌", "┬", "┐"));
    let _ = writeln!(out, "{INDENT}│ {:<key_w$} │ {:>val_w$} │", "Metric", "Value");
    let _ = writeln!(out, "{}", border("├", "┼", "┤"));
    for (key, val) in rows {
        let _ = writeln!(
            out,
            "{INDENT}│ {:<key_w$} │ {:>val_w$} │",
            truncate(key, key_w),
            truncate(val, val_w)
        );
    }
    let _ = writeln!(out, "{}", border("└", "┴", "┘"));
}

fn make_bar(pct: f64, max_width: usize) -> String {
    let filled = ((pct / 100.0) * max_width as f64).round() as usize;
    let empty = max_width.saturating_sub(filled);
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

fn vec_len(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

fn calc_angles(cell: &Mat3) -> (f64, f64, f64) {
    let angle = |u: &[f64; 3], v: &[f64; 3]| {
        let cos = (u[0] * v[0] + u[1] * v[1] + u[2] * v[2]) / (vec_len(u) * vec_len(v));
        cos.clamp(-1.0, 1.0).acos().to_degrees()
    };
    (
        angle(&cell[1], &cell[2]),
        angle(&cell[0], &cell[2]),
        angle(&cell[0], &cell[1]),
    )
}
