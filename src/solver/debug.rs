//! Markdown dump of a solver's system for inspection.
//!
//! The dump is diagnostic only; its layout is not stable.

use std::io::{self, Write};

use crate::solver::{Phase, Solver};

impl Solver {
    /// Write the dump to stderr.
    pub fn debug_print(&self) {
        let stderr = io::stderr();
        let mut out = stderr.lock();
        if let Err(e) = self.write_debug(&mut out) {
            log::warn!("failed to write solver dump: {e}");
        }
    }

    /// Write the current system (matrix entries, locked variables, RHS) as markdown.
    pub fn write_debug<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "# linear system")?;
        writeln!(out, "- mode: {:?}", self.mode())?;
        writeln!(out, "- state: {:?}", self.state())?;
        writeln!(
            out,
            "- variables: {} (free: {}, locked: {})",
            self.vars.len(),
            fmt_opt(self.vars.free_count()),
            self.vars.locked_count()
        )?;
        writeln!(out, "- rows: {}", self.rows)?;
        writeln!(out, "- rhs slots: {}", self.rhs_count())?;
        writeln!(
            out,
            "- factorizer: {} ({})",
            self.factorizer_name().unwrap_or("-"),
            match self.factor_ok {
                Some(true) => "factored",
                Some(false) => "failed",
                None => "pending",
            }
        )?;

        writeln!(out, "\n## Matrix")?;
        match &self.phase {
            Phase::Variables => writeln!(out, "(not started)")?,
            Phase::Matrix(builder) => {
                writeln!(
                    out,
                    "{}x{}, {} triplets (unsummed)",
                    builder.rows(),
                    builder.cols(),
                    builder.triplet_count()
                )?;
                write_entries(out, builder.triplet_iter())?;
            }
            Phase::Solved(system) => {
                let m = system.matrix();
                writeln!(out, "{}x{}, {} nonzeros", m.nrows(), m.ncols(), m.nnz())?;
                write_entries(out, m.triplet_iter())?;
            }
        }

        writeln!(out, "\n## Locked variables")?;
        writeln!(out, "| var | values | pending (row: coeff) |")?;
        writeln!(out, "| - | - | - |")?;
        for (idx, var) in self.vars.iter().enumerate().filter(|(_, v)| v.locked) {
            let pending: Vec<String> = var
                .pending
                .iter()
                .map(|c| format!("{}: {:.6}", c.row, c.value))
                .collect();
            writeln!(
                out,
                "| {idx} | {} | {} |",
                fmt_vec(&var.values),
                pending.join(", ")
            )?;
        }

        writeln!(out, "\n## Right-hand sides")?;
        for slot in 0..self.rhs.rhs_count() {
            if let Ok(b) = self.rhs.vector(slot) {
                writeln!(out, "- b{slot}: {}", fmt_vec(b.as_slice()))?;
            }
        }
        Ok(())
    }
}

fn write_entries<'a, W: Write>(
    out: &mut W,
    entries: impl Iterator<Item = (usize, usize, &'a f64)>,
) -> io::Result<()> {
    writeln!(out, "| row | col | value |")?;
    writeln!(out, "| - | - | - |")?;
    for (row, col, value) in entries {
        writeln!(out, "| {row} | {col} | {value:.6} |")?;
    }
    Ok(())
}

fn fmt_vec(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn fmt_opt(value: Option<usize>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::Solver;

    fn dump(solver: &Solver) -> String {
        let mut buf = Vec::new();
        solver.write_debug(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn dump_tracks_phases() {
        let mut solver = Solver::new(0, 2, 1).unwrap();
        solver.lock_variable(1).unwrap();
        solver.set_variable(0, 1, 3.0).unwrap();
        assert!(dump(&solver).contains("(not started)"));

        solver.matrix_add(0, 0, 2.0).unwrap();
        solver.matrix_add(0, 1, 1.0).unwrap();
        solver.rhs_add(0, 0, 7.0).unwrap();
        let text = dump(&solver);
        assert!(text.contains("1 triplets (unsummed)"));
        assert!(text.contains("| 1 | [3.000000] | 0: 1.000000 |"));
        assert!(text.contains("- b0: [7.000000]"));

        assert!(solver.solve().unwrap());
        let text = dump(&solver);
        assert!(text.contains("1x1, 1 nonzeros"));
        assert!(text.contains("sparse-lu (factored)"));
        assert!(text.contains("- b0: [0.000000]"));
    }
}
