//! Sparse feature encoding in the layout the solver engine consumes.
//!
//! A row is a run of [`FeatureNode`]s with 1-based, strictly ascending
//! indices, followed by a node with index [`SENTINEL_INDEX`]. Zero-valued
//! features are left out. When a positive bias is given, a synthetic
//! feature holding the bias value is appended at index `n_features + 1`.

/// Index terminating every encoded row.
pub const SENTINEL_INDEX: i32 = -1;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FeatureNode {
    /// One-based feature index, or [`SENTINEL_INDEX`].
    pub index: i32,
    pub value: f64,
}

impl FeatureNode {
    pub const fn new(index: i32, value: f64) -> Self {
        Self { index, value }
    }

    pub const fn sentinel() -> Self {
        Self {
            index: SENTINEL_INDEX,
            value: 0.0,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.index == SENTINEL_INDEX
    }
}

/// Index reserved for the bias feature of rows with `n_features` columns.
pub fn bias_index(n_features: usize) -> i32 {
    (n_features + 1) as i32
}

fn push_row(out: &mut Vec<FeatureNode>, row: &[f64], n_features: usize, bias: f64) {
    for (j, &value) in row.iter().take(n_features).enumerate() {
        if value != 0.0 {
            out.push(FeatureNode::new(j as i32 + 1, value));
        }
    }
    if bias > 0.0 {
        out.push(FeatureNode::new(bias_index(n_features), bias));
    }
    out.push(FeatureNode::sentinel());
}

/// Encode a single dense row, sentinel included.
pub fn encode_row(row: &[f64], bias: f64) -> Vec<FeatureNode> {
    encode_row_for(row, row.len(), bias)
}

/// Encode a row against a model trained on `n_features` columns.
///
/// Columns past `n_features` are dropped and the bias node lands on the
/// index reserved at training time.
pub fn encode_row_for(row: &[f64], n_features: usize, bias: f64) -> Vec<FeatureNode> {
    let nnz = row.iter().filter(|&&v| v != 0.0).count();
    let mut out = Vec::with_capacity(nnz + 2);
    push_row(&mut out, row, n_features, bias);
    out
}

/// Many encoded rows sharing one contiguous node arena.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseRows {
    nodes: Vec<FeatureNode>,
    /// `offsets[i]..offsets[i + 1]` is row `i`, sentinel included.
    offsets: Vec<usize>,
}

impl SparseRows {
    pub fn encode<R: AsRef<[f64]>>(rows: &[R], bias: f64) -> Self {
        let extra = if bias > 0.0 { 2 } else { 1 };
        let capacity = rows
            .iter()
            .map(|r| r.as_ref().iter().filter(|&&v| v != 0.0).count() + extra)
            .sum();

        let mut nodes = Vec::with_capacity(capacity);
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        offsets.push(0);
        for row in rows {
            let row = row.as_ref();
            push_row(&mut nodes, row, row.len(), bias);
            offsets.push(nodes.len());
        }
        SparseRows { nodes, offsets }
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row `i` including its sentinel node.
    pub fn row(&self, i: usize) -> &[FeatureNode] {
        &self.nodes[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Row `i` without the sentinel.
    pub fn features(&self, i: usize) -> &[FeatureNode] {
        &self.nodes[self.offsets[i]..self.offsets[i + 1] - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[FeatureNode]> + '_ {
        (0..self.len()).map(move |i| self.features(i))
    }
}

/// Dot product of a dense weight vector with a sparse row.
///
/// Features with an index beyond `w.len()` contribute nothing.
pub fn dot(w: &[f64], x: &[FeatureNode]) -> f64 {
    let mut sum = 0.0;
    for node in x {
        if node.is_sentinel() {
            break;
        }
        if let Some(wj) = w.get(node.index as usize - 1) {
            sum += wj * node.value;
        }
    }
    sum
}

/// `w += a * x`.
pub fn axpy(a: f64, x: &[FeatureNode], w: &mut [f64]) {
    for node in x {
        if node.is_sentinel() {
            break;
        }
        w[node.index as usize - 1] += a * node.value;
    }
}

pub fn squared_norm(x: &[FeatureNode]) -> f64 {
    x.iter()
        .take_while(|n| !n.is_sentinel())
        .map(|n| n.value * n.value)
        .sum()
}
