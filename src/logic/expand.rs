use log::debug;

use crate::model::{Node, Path, Segment};

/// Upper bound on expansion passes. Structure deeper than this is left
/// unflattened; the XNAT data type is built against this behaviour.
pub const MAX_EXPANSION_PASSES: usize = 5;

/// Result of expanding root groups into leaf paths
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub paths: Vec<Path>,
    /// Passes actually executed, including the one that found the fixed point
    pub passes: usize,
    /// False when the pass cap was hit before a fixed point
    pub converged: bool,
}

pub struct PathExpander;

impl PathExpander {
    /// Expand with the default pass cap
    pub fn expand(paths: Vec<Path>, record: &Node) -> Expansion {
        Self::expand_with_limit(paths, record, MAX_EXPANSION_PASSES)
    }

    /// Breadth-first expansion of `paths` towards the leaves of `record`.
    ///
    /// Each pass replaces a path resolving to a mapping with one path per key,
    /// and a path resolving to a sequence with one path per element (plus the
    /// element's keys when the element is a mapping). Scalars are kept. A pass
    /// that expands no mapping finishes the walk and its own output is
    /// discarded, so a sequence of scalars seen only in that pass stays whole.
    pub fn expand_with_limit(mut paths: Vec<Path>, record: &Node, max_passes: usize) -> Expansion {
        for pass in 1..=max_passes {
            let mut finished = true;
            let mut next = Vec::with_capacity(paths.len());

            for path in &paths {
                let Some(node) = record.resolve(path) else {
                    continue;
                };

                match node {
                    Node::Mapping(map) => {
                        finished = false;
                        next.extend(map.keys().map(|key| child(path, [Segment::Key(key.to_string())])));
                    }
                    Node::Sequence(items) => {
                        for (idx, item) in items.iter().enumerate() {
                            match item {
                                Node::Mapping(map) => {
                                    finished = false;
                                    next.extend(map.keys().map(|key| {
                                        child(path, [Segment::Index(idx), Segment::Key(key.to_string())])
                                    }));
                                }
                                _ => next.push(child(path, [Segment::Index(idx)])),
                            }
                        }
                    }
                    Node::Scalar(_) => next.push(path.clone()),
                }
            }

            if finished {
                debug!("Path expansion reached a fixed point after {} passes", pass);
                return Expansion {
                    paths,
                    passes: pass,
                    converged: true,
                };
            }
            paths = next;
        }

        debug!(
            "Path expansion stopped at the {} pass cap with {} paths",
            max_passes,
            paths.len()
        );
        Expansion {
            paths,
            passes: max_passes,
            converged: false,
        }
    }
}

fn child<const N: usize>(parent: &Path, segments: [Segment; N]) -> Path {
    let mut path = Vec::with_capacity(parent.len() + N);
    path.extend_from_slice(parent);
    path.extend(segments);
    path
}
