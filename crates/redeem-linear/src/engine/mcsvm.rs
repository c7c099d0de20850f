//! Crammer and Singer multi-class SVM, solved by sequential dual updates.
//!
//! `w` is laid out feature-major: the weights of feature `j` for all classes
//! are `w[j * nr_class..(j + 1) * nr_class]`.
use rand::rngs::StdRng;
use rand::Rng;

use crate::engine::{Printer, SubProblem};
use crate::sparse::squared_norm;

pub(crate) struct McsvmCs<'a> {
    prob: &'a SubProblem<'a>,
    nr_class: usize,
    /// Class index of every row.
    y: Vec<usize>,
    /// Per-class cost.
    c: Vec<f64>,
    eps: f64,
    max_iter: usize,
    b: Vec<f64>,
    g: Vec<f64>,
}

impl<'a> McsvmCs<'a> {
    /// `prob.y` must hold class indices `0..nr_class`.
    pub(crate) fn new(prob: &'a SubProblem<'a>, nr_class: usize, weighted_c: &[f64], eps: f64) -> Self {
        McsvmCs {
            prob,
            nr_class,
            y: prob.y.iter().map(|&v| v as usize).collect(),
            c: weighted_c.to_vec(),
            eps,
            max_iter: 100_000,
            b: vec![0.0; nr_class],
            g: vec![0.0; nr_class],
        }
    }

    /// Closed-form solution of the per-row sub-problem over the active classes.
    fn solve_sub_problem(&self, a_i: f64, yi: usize, c_yi: f64, active_i: usize, alpha_new: &mut [f64]) {
        let mut d: Vec<f64> = self.b[..active_i].to_vec();
        if yi < active_i {
            d[yi] += a_i * c_yi;
        }
        d.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

        let mut beta = d[0] - a_i * c_yi;
        let mut r = 1;
        while r < active_i && beta < r as f64 * d[r] {
            beta += d[r];
            r += 1;
        }
        beta /= r as f64;

        for (r, alpha) in alpha_new.iter_mut().enumerate().take(active_i) {
            *alpha = if r == yi {
                c_yi.min((beta - self.b[r]) / a_i)
            } else {
                0.0f64.min((beta - self.b[r]) / a_i)
            };
        }
    }

    fn be_shrunk(&self, i: usize, m: usize, yi: usize, alpha_i: f64, min_g: f64) -> bool {
        let bound = if m == yi { self.c[self.y[i]] } else { 0.0 };
        alpha_i == bound && self.g[m] < min_g
    }

    pub(crate) fn solve(&mut self, w: &mut [f64], rng: &mut StdRng, out: &Printer) {
        let l = self.prob.len();
        let nr_class = self.nr_class;

        let mut alpha = vec![0.0; l * nr_class];
        let mut alpha_new = vec![0.0; nr_class];
        let mut index: Vec<usize> = (0..l).collect();
        let mut qd = vec![0.0; l];
        let mut d_ind = vec![0usize; nr_class];
        let mut d_val = vec![0.0; nr_class];
        let mut alpha_index = vec![0usize; l * nr_class];
        let mut y_index = vec![0usize; l];
        let mut active_size_i = vec![nr_class; l];

        let mut active_size = l;
        let mut eps_shrink = (10.0 * self.eps).max(1.0);
        let mut start_from_all = true;

        w.iter_mut().for_each(|v| *v = 0.0);
        for i in 0..l {
            for m in 0..nr_class {
                alpha_index[i * nr_class + m] = m;
            }
            qd[i] = squared_norm(self.prob.x[i]);
            y_index[i] = self.y[i];
        }

        let mut iter = 0;
        while iter < self.max_iter {
            let mut stopping = f64::NEG_INFINITY;
            for i in 0..active_size {
                let j = rng.gen_range(i..active_size);
                index.swap(i, j);
            }

            let mut s = 0;
            while s < active_size {
                let i = index[s];
                let a_i = qd[i];
                let base = i * nr_class;
                let xi = self.prob.x[i];

                if a_i > 0.0 {
                    let act = active_size_i[i];
                    for m in 0..act {
                        self.g[m] = 1.0;
                    }
                    if y_index[i] < act {
                        self.g[y_index[i]] = 0.0;
                    }

                    for node in xi.iter().take_while(|n| !n.is_sentinel()) {
                        let w_i = (node.index as usize - 1) * nr_class;
                        for m in 0..act {
                            self.g[m] += w[w_i + alpha_index[base + m]] * node.value;
                        }
                    }

                    let mut min_g = f64::INFINITY;
                    let mut max_g = f64::NEG_INFINITY;
                    for m in 0..act {
                        if alpha[base + alpha_index[base + m]] < 0.0 && self.g[m] < min_g {
                            min_g = self.g[m];
                        }
                        if self.g[m] > max_g {
                            max_g = self.g[m];
                        }
                    }
                    if y_index[i] < act
                        && alpha[base + self.y[i]] < self.c[self.y[i]]
                        && self.g[y_index[i]] < min_g
                    {
                        min_g = self.g[y_index[i]];
                    }

                    let mut m = 0;
                    while m < active_size_i[i] {
                        if self.be_shrunk(i, m, y_index[i], alpha[base + alpha_index[base + m]], min_g) {
                            active_size_i[i] -= 1;
                            while active_size_i[i] > m {
                                let last = active_size_i[i];
                                if !self.be_shrunk(i, last, y_index[i], alpha[base + alpha_index[base + last]], min_g) {
                                    alpha_index.swap(base + m, base + last);
                                    self.g.swap(m, last);
                                    if y_index[i] == last {
                                        y_index[i] = m;
                                    } else if y_index[i] == m {
                                        y_index[i] = last;
                                    }
                                    break;
                                }
                                active_size_i[i] -= 1;
                            }
                        }
                        m += 1;
                    }

                    if active_size_i[i] <= 1 {
                        active_size -= 1;
                        index.swap(s, active_size);
                        continue;
                    }

                    if max_g - min_g <= 1e-12 {
                        s += 1;
                        continue;
                    }
                    stopping = stopping.max(max_g - min_g);

                    let act = active_size_i[i];
                    for m in 0..act {
                        self.b[m] = self.g[m] - a_i * alpha[base + alpha_index[base + m]];
                    }

                    self.solve_sub_problem(a_i, y_index[i], self.c[self.y[i]], act, &mut alpha_new);

                    let mut nz_d = 0;
                    for m in 0..act {
                        let slot = base + alpha_index[base + m];
                        let d = alpha_new[m] - alpha[slot];
                        alpha[slot] = alpha_new[m];
                        if d.abs() >= 1e-12 {
                            d_ind[nz_d] = alpha_index[base + m];
                            d_val[nz_d] = d;
                            nz_d += 1;
                        }
                    }

                    for node in xi.iter().take_while(|n| !n.is_sentinel()) {
                        let w_i = (node.index as usize - 1) * nr_class;
                        for k in 0..nz_d {
                            w[w_i + d_ind[k]] += d_val[k] * node.value;
                        }
                    }
                }
                s += 1;
            }

            iter += 1;
            if iter % 10 == 0 {
                out.info(format_args!("."));
            }

            if stopping < eps_shrink {
                if stopping < self.eps && start_from_all {
                    break;
                }
                active_size = l;
                active_size_i.iter_mut().for_each(|a| *a = nr_class);
                out.info(format_args!("*"));
                eps_shrink = (eps_shrink / 2.0).max(self.eps);
                start_from_all = true;
            } else {
                start_from_all = false;
            }
        }

        out.info(format_args!("optimization finished, #iter = {}", iter));
        if iter >= self.max_iter {
            out.info(format_args!("WARNING: reaching max number of iterations"));
        }

        let mut v = 0.0;
        let mut n_sv = 0;
        for wv in w.iter() {
            v += wv * wv;
        }
        v *= 0.5;
        for i in 0..l * nr_class {
            v += alpha[i];
            if alpha[i].abs() > 0.0 {
                n_sv += 1;
            }
        }
        for i in 0..l {
            v -= alpha[i * nr_class + self.y[i]];
        }
        out.info(format_args!("Objective value = {}", v));
        out.info(format_args!("nSV = {}", n_sv));
    }
}
