//! CPLEX LP-format export of a dispatch model.
//!
//! The written file is the hand-off point to an external MILP solver;
//! variable names in the solver's answer map back onto the model through
//! [`crate::opt::solution::Solution`].

use std::io::{self, Write};

use crate::opt::model::{DispatchModel, LinExpr, Sense, VarKind};

/// Writes the model in LP format to `out`.
///
/// # Errors
///
/// Propagates I/O errors from the writer.
pub fn write_lp<W: Write>(model: &DispatchModel, out: &mut W) -> io::Result<()> {
    writeln!(out, "Minimize")?;
    writeln!(out, " obj: {}", format_expr(model, &model.objective))?;

    writeln!(out, "Subject To")?;
    for c in &model.constraints {
        writeln!(
            out,
            " {}: {} {} {}",
            c.name,
            format_expr(model, &c.expr),
            c.sense,
            format_number(c.rhs)
        )?;
    }

    writeln!(out, "Bounds")?;
    for v in model.vars() {
        if v.kind == VarKind::Binary {
            continue;
        }
        writeln!(
            out,
            " {} <= {} <= {}",
            format_number(v.lower),
            v.name,
            format_number(v.upper)
        )?;
    }

    let binaries: Vec<&str> = model
        .vars()
        .iter()
        .filter(|v| v.kind == VarKind::Binary)
        .map(|v| v.name.as_str())
        .collect();
    if !binaries.is_empty() {
        writeln!(out, "Binaries")?;
        writeln!(out, " {}", binaries.join(" "))?;
    }

    writeln!(out, "End")
}

/// Renders the model as an LP-format string.
pub fn to_lp_string(model: &DispatchModel) -> String {
    let mut buf = Vec::new();
    // Vec<u8> writes cannot fail
    write_lp(model, &mut buf).expect("in-memory write");
    String::from_utf8(buf).expect("LP text is ASCII")
}

fn format_expr(model: &DispatchModel, expr: &LinExpr) -> String {
    let mut parts = Vec::with_capacity(expr.terms.len());
    for (i, (var, coeff)) in expr.terms.iter().enumerate() {
        let name = &model.vars()[var.0].name;
        let sign = if *coeff < 0.0 {
            "- "
        } else if i == 0 {
            ""
        } else {
            "+ "
        };
        parts.push(format!("{sign}{} {name}", format_number(coeff.abs())));
    }
    if expr.constant != 0.0 {
        let sign = if expr.constant < 0.0 { "- " } else { "+ " };
        parts.push(format!("{sign}{}", format_number(expr.constant.abs())));
    }
    if parts.is_empty() {
        "0".to_string()
    } else {
        parts.join(" ")
    }
}

/// Trims trailing zeros so the file stays readable; keeps full precision
/// for values that need it.
fn format_number(x: f64) -> String {
    if x == x.trunc() && x.abs() < 1e15 {
        format!("{x:.0}")
    } else {
        format!("{x}")
    }
}
