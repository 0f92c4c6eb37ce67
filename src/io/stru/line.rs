//! Grammar of one atom line in the `ATOMIC_POSITIONS` section.
//!
//! ```text
//! x y z [m1 m2 m3] [mag m | mag mx my mz] [v vx vy vz] [angle1 a] [angle2 a]
//!       [sc s | sc sx sy sz] [lambda l | lambda lx ly lz]
//! ```
//!
//! Move flags are positional and must be the literal tokens `0` or `1`.
//! Every other attribute is introduced by its keyword, may appear at most
//! once, and may come in any order.

use std::fmt::Write as _;

use crate::error::Error;
use crate::model::extension::Value;
use crate::model::types::Vec3;

/// A value given either once or per Cartesian axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Component<T> {
    Scalar(T),
    Vector([T; 3]),
}

impl From<Component<f64>> for Value {
    fn from(c: Component<f64>) -> Self {
        match c {
            Component::Scalar(v) => Value::Scalar(v),
            Component::Vector(v) => Value::Vector(v),
        }
    }
}

impl From<Component<bool>> for Value {
    fn from(c: Component<bool>) -> Self {
        match c {
            Component::Scalar(v) => Value::Flag(v),
            Component::Vector(v) => Value::Flags(v),
        }
    }
}

impl Component<f64> {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Scalar(v) => Some(Component::Scalar(*v)),
            Value::Vector(v) => Some(Component::Vector(*v)),
            _ => None,
        }
    }
}

impl Component<bool> {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Flag(v) => Some(Component::Scalar(*v)),
            Value::Flags(v) => Some(Component::Vector(*v)),
            _ => None,
        }
    }
}

/// Every attribute one atom line can carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtomLine {
    pub position: Vec3,
    pub move_flags: Option<[bool; 3]>,
    pub velocity: Option<Vec3>,
    pub mag: Option<Component<f64>>,
    pub angle1: Option<f64>,
    pub angle2: Option<f64>,
    pub spin_constraint: Option<Component<bool>>,
    pub lambda: Option<Component<f64>>,
}

impl AtomLine {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Mag,
    Velocity,
    Angle1,
    Angle2,
    SpinConstraint,
    Lambda,
}

impl Keyword {
    const ALL: [Keyword; 6] = [
        Keyword::Mag,
        Keyword::Velocity,
        Keyword::Angle1,
        Keyword::Angle2,
        Keyword::SpinConstraint,
        Keyword::Lambda,
    ];

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.token() == token)
    }

    fn token(self) -> &'static str {
        match self {
            Keyword::Mag => "mag",
            Keyword::Velocity => "v",
            Keyword::Angle1 => "angle1",
            Keyword::Angle2 => "angle2",
            Keyword::SpinConstraint => "sc",
            Keyword::Lambda => "lambda",
        }
    }

    fn arity(self) -> &'static [usize] {
        match self {
            Keyword::Mag | Keyword::SpinConstraint | Keyword::Lambda => &[1, 3],
            Keyword::Velocity => &[3],
            Keyword::Angle1 | Keyword::Angle2 => &[1],
        }
    }
}

fn is_move_flag(token: &str) -> bool {
    token == "0" || token == "1"
}

fn component(values: &[f64]) -> Component<f64> {
    match values {
        [v] => Component::Scalar(*v),
        _ => Component::Vector([values[0], values[1], values[2]]),
    }
}

/// Parses one atom line.
///
/// # Errors
///
/// Returns [`Error::MalformedLine`] with the zero-based token position of
/// the first violation: fewer than three coordinates, a non-numeric value,
/// a token where a keyword is expected, a repeated keyword, or a keyword
/// followed by the wrong number of values.
pub fn parse_atom_line(line: &str) -> Result<AtomLine, Error> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(Error::malformed(
            line,
            tokens.len(),
            "an atom line needs three coordinates",
        ));
    }

    let mut position = [0.0; 3];
    for (k, slot) in position.iter_mut().enumerate() {
        *slot = tokens[k].parse().map_err(|_| {
            Error::malformed(line, k, format!("coordinate '{}' is not a number", tokens[k]))
        })?;
    }
    let mut atom = AtomLine::at(position);

    let mut idx = 3;
    if tokens.len() - idx >= 3 && tokens[idx..idx + 3].iter().all(|t| is_move_flag(t)) {
        atom.move_flags = Some([tokens[3] == "1", tokens[4] == "1", tokens[5] == "1"]);
        idx += 3;
    }

    let mut seen: Vec<Keyword> = Vec::new();
    while idx < tokens.len() {
        let token = tokens[idx];
        let Some(keyword) = Keyword::from_token(token) else {
            let details = if token.parse::<f64>().is_ok() {
                format!("value '{token}' does not follow a keyword; move flags take exactly three 0/1 tokens")
            } else {
                format!("unknown keyword '{token}'")
            };
            return Err(Error::malformed(line, idx, details));
        };
        if seen.contains(&keyword) {
            return Err(Error::malformed(
                line,
                idx,
                format!("keyword '{token}' given twice"),
            ));
        }
        seen.push(keyword);

        let start = idx + 1;
        let end = tokens[start..]
            .iter()
            .position(|t| Keyword::from_token(t).is_some())
            .map_or(tokens.len(), |p| start + p);

        let mut values = Vec::with_capacity(end - start);
        for (offset, raw) in tokens[start..end].iter().enumerate() {
            let v: f64 = raw.parse().map_err(|_| {
                Error::malformed(
                    line,
                    start + offset,
                    format!("value '{raw}' of '{token}' is not a number"),
                )
            })?;
            values.push(v);
        }

        let allowed = keyword.arity();
        if !allowed.contains(&values.len()) {
            let expected = allowed
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(Error::malformed(
                line,
                idx,
                format!("'{token}' expects {expected} values, got {}", values.len()),
            ));
        }

        match keyword {
            Keyword::Mag => atom.mag = Some(component(&values)),
            Keyword::Velocity => atom.velocity = Some([values[0], values[1], values[2]]),
            Keyword::Angle1 => atom.angle1 = Some(values[0]),
            Keyword::Angle2 => atom.angle2 = Some(values[0]),
            Keyword::Lambda => atom.lambda = Some(component(&values)),
            Keyword::SpinConstraint => {
                if let Some(bad) = values.iter().position(|&v| v != 0.0 && v != 1.0) {
                    return Err(Error::malformed(
                        line,
                        start + bad,
                        "'sc' values must be 0 or 1",
                    ));
                }
                atom.spin_constraint = Some(match component(&values) {
                    Component::Scalar(v) => Component::Scalar(v == 1.0),
                    Component::Vector(v) => Component::Vector([v[0] == 1.0, v[1] == 1.0, v[2] == 1.0]),
                });
            }
        }
        idx = end;
    }

    Ok(atom)
}

fn push_floats(out: &mut String, values: &[f64]) {
    for v in values {
        let _ = write!(out, " {v:.12}");
    }
}

fn push_flags(out: &mut String, flags: &[bool]) {
    for f in flags {
        out.push_str(if *f { " 1" } else { " 0" });
    }
}

fn push_component(out: &mut String, keyword: Keyword, value: &Component<f64>) {
    out.push(' ');
    out.push_str(keyword.token());
    match value {
        Component::Scalar(v) => push_floats(out, &[*v]),
        Component::Vector(v) => push_floats(out, v),
    }
}

/// Formats one atom line. Attributes follow the fixed order
/// `mag, v, angle1, angle2, sc, lambda`, each in the form it is stored in.
pub fn write_atom_line(atom: &AtomLine) -> String {
    let mut out = format!(
        "{:.12} {:.12} {:.12}",
        atom.position[0], atom.position[1], atom.position[2]
    );
    if let Some(flags) = &atom.move_flags {
        push_flags(&mut out, flags);
    }
    if let Some(mag) = &atom.mag {
        push_component(&mut out, Keyword::Mag, mag);
    }
    if let Some(v) = &atom.velocity {
        push_component(&mut out, Keyword::Velocity, &Component::Vector(*v));
    }
    if let Some(a) = atom.angle1 {
        push_component(&mut out, Keyword::Angle1, &Component::Scalar(a));
    }
    if let Some(a) = atom.angle2 {
        push_component(&mut out, Keyword::Angle2, &Component::Scalar(a));
    }
    if let Some(sc) = &atom.spin_constraint {
        out.push_str(" sc");
        match sc {
            Component::Scalar(f) => push_flags(&mut out, &[*f]),
            Component::Vector(f) => push_flags(&mut out, f),
        }
    }
    if let Some(lambda) = &atom.lambda {
        push_component(&mut out, Keyword::Lambda, lambda);
    }
    out
}
