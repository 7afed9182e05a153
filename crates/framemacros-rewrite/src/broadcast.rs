//! Shape broadcasting over column selections and values
//!
//! Shapes align on their leading dimensions; a missing trailing dimension
//! counts as 1 and size-1 dimensions stretch. Iteration is column-major.

use framemacros_ir::Selection;

use crate::error::RewriteError;

/// Common shape of all operands, or `None` when two sizes disagree.
pub fn broadcast_shapes(shapes: &[Vec<usize>]) -> Option<Vec<usize>> {
    let ndims = shapes.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = vec![1; ndims];
    for shape in shapes {
        for (dim, &size) in shape.iter().enumerate() {
            if out[dim] == 1 {
                out[dim] = size;
            } else if size != 1 && size != out[dim] {
                return None;
            }
        }
    }
    Some(out)
}

/// Multi-indices of `shape`, first dimension fastest.
pub fn column_major(shape: &[usize]) -> impl Iterator<Item = Vec<usize>> {
    let total: usize = shape.iter().product();
    let shape = shape.to_vec();
    (0..total).map(move |mut linear| {
        shape
            .iter()
            .map(|&size| {
                let i = linear % size;
                linear /= size;
                i
            })
            .collect()
    })
}

/// Flat column-major offset of a broadcast index into an operand of `shape`.
pub fn operand_offset(shape: &[usize], index: &[usize]) -> usize {
    let mut offset = 0;
    let mut stride = 1;
    for (dim, &size) in shape.iter().enumerate() {
        let i = if size == 1 {
            0
        } else {
            index.get(dim).copied().unwrap_or(0)
        };
        offset += i * stride;
        stride *= size;
    }
    offset
}

/// Resolved sources and sink names paired up element by element.
#[derive(Debug, Clone, PartialEq)]
pub struct Pairing {
    pub shape: Vec<usize>,
    /// One entry per broadcast element: a name per source.
    pub sources: Vec<Vec<String>>,
    /// One entry per broadcast element when an explicit sink was given.
    pub sinks: Option<Vec<String>>,
}

/// Pair source selections with an optional sink selection.
///
/// A multi-dimensional sink whose shape differs from the sources' is
/// flattened column-major before pairing.
pub fn expand(sources: &[Selection], sink: Option<&Selection>) -> Result<Pairing, RewriteError> {
    let source_shapes: Vec<Vec<usize>> = sources.iter().map(|s| s.shape.clone()).collect();
    let source_shape = broadcast_shapes(&source_shapes).ok_or_else(|| {
        RewriteError::BroadcastShapeMismatch {
            shapes: source_shapes.clone(),
        }
    })?;

    let sink = sink.map(|selection| {
        let mut shape = selection.shape.clone();
        if shape.len() >= 2 && shape != source_shape {
            shape = vec![selection.names.len()];
        }
        (shape, &selection.names)
    });

    let shape = match &sink {
        Some((sink_shape, _)) => {
            let shapes = vec![source_shape.clone(), sink_shape.clone()];
            broadcast_shapes(&shapes).ok_or(RewriteError::BroadcastShapeMismatch { shapes })?
        }
        None => source_shape,
    };

    let mut paired_sources = Vec::new();
    let mut paired_sinks = sink.as_ref().map(|_| Vec::new());
    for index in column_major(&shape) {
        paired_sources.push(
            sources
                .iter()
                .map(|s| s.names[operand_offset(&s.shape, &index)].clone())
                .collect(),
        );
        if let (Some(out), Some((sink_shape, names))) = (paired_sinks.as_mut(), &sink) {
            out.push(names[operand_offset(sink_shape, &index)].clone());
        }
    }

    Ok(Pairing {
        shape,
        sources: paired_sources,
        sinks: paired_sinks,
    })
}
