//! Plain-text model files.
//!
//! ```text
//! solver_type L2R_LR
//! nr_class 2
//! label 1 -1
//! nr_feature 3
//! bias 1
//! w
//! 0.25
//! -0.5
//! ...
//! ```
//!
//! The `w` block has one line per feature (bias column last when the bias is
//! positive) holding the `nr_w` per-class weights of that feature. Numbers are
//! written in their shortest round-trip form so a loaded model reproduces the
//! saved one bit for bit.
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, warn};

use crate::config::SolverType;
use crate::engine::RawModel;

pub(crate) fn write_model<W: Write>(out: &mut W, model: &RawModel) -> std::io::Result<()> {
    writeln!(out, "solver_type {}", model.solver.name())?;
    writeln!(out, "nr_class {}", model.nr_class)?;
    write!(out, "label")?;
    for label in &model.labels {
        write!(out, " {}", label)?;
    }
    writeln!(out)?;
    writeln!(out, "nr_feature {}", model.nr_feature)?;
    writeln!(out, "bias {}", model.bias)?;
    writeln!(out, "w")?;

    let nr_w = model.nr_w();
    for chunk in model.w.chunks(nr_w) {
        let line: Vec<String> = chunk.iter().map(|v| v.to_string()).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    out.flush()
}

/// Write `model` to `path`. Returns 0 on success and -1 on any I/O failure.
pub(crate) fn save(path: &Path, model: &RawModel) -> i32 {
    let result = File::create(path).and_then(|f| write_model(&mut BufWriter::new(f), model));
    match result {
        Ok(()) => 0,
        Err(e) => {
            warn!("Failed to write model to {}: {}", path.display(), e);
            -1
        }
    }
}

pub(crate) fn read_model<R: BufRead>(reader: R) -> Option<RawModel> {
    let mut solver = None;
    let mut nr_class = None;
    let mut nr_feature = None;
    let mut labels = Vec::new();
    let mut bias = None;

    let mut lines = reader.lines();
    loop {
        let line = lines.next()?.ok()?;
        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else {
            continue;
        };
        match key {
            "solver_type" => solver = Some(parts.next()?.parse::<SolverType>().ok()?),
            "nr_class" => nr_class = Some(parts.next()?.parse::<usize>().ok()?),
            "nr_feature" => nr_feature = Some(parts.next()?.parse::<usize>().ok()?),
            "bias" => bias = Some(parts.next()?.parse::<f64>().ok()?),
            "label" => {
                labels = parts
                    .map(|p| p.parse::<i32>().ok())
                    .collect::<Option<Vec<i32>>>()?;
            }
            "w" => break,
            other => {
                debug!("Unknown key in model file: {}", other);
                return None;
            }
        }
    }

    let mut model = RawModel::new(solver?, nr_class?, nr_feature?, bias?, labels, Vec::new());
    if model.nr_class == 0 || model.labels.len() != model.nr_class {
        return None;
    }

    // header sizes are untrusted: no preallocation, stop at the first extra value
    let w_size = if model.bias > 0.0 {
        model.nr_feature.checked_add(1)?
    } else {
        model.nr_feature
    };
    let expected = w_size.checked_mul(model.nr_w())?;
    let mut w = Vec::new();
    for line in lines {
        for token in line.ok()?.split_whitespace() {
            if w.len() == expected {
                return None;
            }
            w.push(token.parse::<f64>().ok()?);
        }
    }
    if w.len() != expected {
        return None;
    }
    model.w = w;
    Some(model)
}

/// Read a model from `path`; `None` when the file is missing or malformed.
pub(crate) fn load(path: &Path) -> Option<RawModel> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to open model {}: {}", path.display(), e);
            return None;
        }
    };
    let model = read_model(BufReader::new(file));
    if model.is_none() {
        warn!("Malformed model file: {}", path.display());
    }
    model
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawModel {
        RawModel::new(
            SolverType::L2R_LR,
            2,
            2,
            1.0,
            vec![1, -1],
            vec![0.1 + 0.2, -1.0 / 3.0, 2.5e-17],
        )
    }

    #[test]
    fn text_layout() {
        let mut buf = Vec::new();
        write_model(&mut buf, &sample()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "solver_type L2R_LR");
        assert_eq!(lines[2], "label 1 -1");
        assert_eq!(lines[4], "bias 1");
        assert_eq!(lines[5], "w");
        assert_eq!(lines.len(), 6 + 3);
    }

    #[test]
    fn weights_survive_exactly() {
        let mut buf = Vec::new();
        write_model(&mut buf, &sample()).unwrap();
        let loaded = read_model(buf.as_slice()).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn truncated_weights_are_rejected() {
        let text = "solver_type L2R_LR\nnr_class 2\nlabel 1 -1\nnr_feature 2\nbias -1\nw\n0.5\n";
        assert!(read_model(text.as_bytes()).is_none());
    }

    #[test]
    fn empty_label_set_is_rejected() {
        let text = "solver_type L2R_LR\nnr_class 0\nlabel\nnr_feature 1\nbias -1\nw\n0.5\n";
        assert!(read_model(text.as_bytes()).is_none());
    }

    #[test]
    fn oversized_header_is_rejected() {
        let text = "solver_type L2R_LR\nnr_class 2\nlabel 1 -1\nnr_feature 100000000000000\nbias -1\nw\n0.5\n";
        assert!(read_model(text.as_bytes()).is_none());

        let text = format!(
            "solver_type MCSVM_CS\nnr_class 3\nlabel 1 2 3\nnr_feature {}\nbias 1\nw\n0.5\n",
            usize::MAX
        );
        assert!(read_model(text.as_bytes()).is_none());
    }

    #[test]
    fn extra_weights_are_rejected() {
        let text = "solver_type L2R_LR\nnr_class 2\nlabel 1 -1\nnr_feature 1\nbias -1\nw\n0.5\n0.25\n";
        assert!(read_model(text.as_bytes()).is_none());
    }

    #[test]
    fn unknown_solver_is_rejected() {
        let text = "solver_type NOPE\nnr_class 2\nlabel 1 -1\nnr_feature 1\nbias -1\nw\n0.5\n";
        assert!(read_model(text.as_bytes()).is_none());
    }
}
