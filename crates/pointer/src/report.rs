//! Human-readable views of the computed alias sets.

use std::io;

use kestrel_ir::ValueRef;

use crate::engine::PointsToEngine;

pub(crate) fn print_sets(engine: &PointsToEngine, w: &mut dyn io::Write) -> io::Result<()> {
    let prog = engine.program();
    for (&value, &set) in &engine.bindings {
        writeln!(w, "V: {}", prog.value_string(value))?;
        for &member in &engine.sets[set] {
            writeln!(w, "\tpoints to -> {}", prog.value_string(member))?;
        }
    }
    Ok(())
}

impl PointsToEngine {
    /// Writes a histogram of points-to set sizes: one row per observed set
    /// size with a bar scaled to the share of bindings. With `peek > 0`,
    /// additionally shows up to `peek` members of one of the largest sets.
    pub fn distribution_report(&self, w: &mut dyn io::Write, peek: usize) -> io::Result<()> {
        let mut size_counts: Vec<(usize, usize)> = Vec::new();
        for &set in self.bindings.values() {
            let size = self.sets[set].len();
            match size_counts.iter_mut().find(|(s, _)| *s == size) {
                Some((_, count)) => *count += 1,
                None => size_counts.push((size, 1)),
            }
        }
        size_counts.sort_unstable_by_key(|(size, _)| *size);

        let total: usize = size_counts.iter().map(|(_, count)| count).sum();
        if total == 0 {
            return writeln!(w, "no points-to sets");
        }

        writeln!(w, "{:>10}  {:^50} {:>14}", "PtS Size", "Distribution", "Number of sets")?;
        for &(size, count) in &size_counts {
            let bar = "*".repeat(count * 50 / total);
            writeln!(w, "{size:>10} |{bar:<50} {count:<10}")?;
        }
        writeln!(w)?;

        if peek > 0 {
            let largest = size_counts.last().map(|(size, _)| *size).unwrap_or(0);
            for (&value, &set) in &self.bindings {
                if self.sets[set].len() == largest {
                    writeln!(w, "peek into one of the biggest points-to sets:")?;
                    self.peek_into(w, value, peek)?;
                    break;
                }
            }
        }
        Ok(())
    }

    fn peek_into(&self, w: &mut dyn io::Write, value: ValueRef, peek: usize) -> io::Result<()> {
        let prog = self.program().clone();
        let set = self.bindings[&value];
        writeln!(w, "Value: {}", prog.value_string(value))?;
        writeln!(w, "aliases with: {{")?;
        for (shown, &member) in self.sets[set].iter().enumerate() {
            if shown >= peek {
                writeln!(w, "... and {} more", self.sets[set].len() - peek)?;
                break;
            }
            writeln!(w, "{}", prog.value_string(member))?;
        }
        writeln!(w, "}}")
    }
}
