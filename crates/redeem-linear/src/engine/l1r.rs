//! Coordinate-descent Newton for the L1-regularized problems.
//!
//! Both solvers walk the features, not the rows, so the training rows are
//! first transposed into columns of `(row, value)` pairs.
use rand::rngs::StdRng;
use rand::Rng;

use crate::engine::{Printer, SubProblem};

const MAX_ITER: usize = 1000;
const MAX_NUM_LINESEARCH: usize = 20;
const SIGMA: f64 = 0.01;

type Column = Vec<(usize, f64)>;

/// Column-major copy of the rows: entry `j` holds feature `j + 1`.
fn transpose(prob: &SubProblem) -> Vec<Column> {
    let mut columns = vec![Vec::new(); prob.n];
    for (i, row) in prob.x.iter().enumerate() {
        for node in row.iter().take_while(|n| !n.is_sentinel()) {
            let j = node.index as usize - 1;
            if j < prob.n {
                columns[j].push((i, node.value));
            }
        }
    }
    columns
}

#[inline]
fn geti(y: f64) -> usize {
    (y as i32 + 1) as usize
}

fn shuffle(index: &mut [usize], rng: &mut StdRng) {
    let len = index.len();
    for i in 0..len {
        let j = rng.gen_range(i..len);
        index.swap(i, j);
    }
}

/// Newton direction for one coordinate of `|w_j| + smooth(w_j)`.
#[inline]
fn newton_direction(gp: f64, gn: f64, h: f64, wj: f64) -> f64 {
    if gp <= h * wj {
        -gp / h
    } else if gn >= h * wj {
        -gn / h
    } else {
        -wj
    }
}

/// Minimum-norm subgradient violation of coordinate `j`, or `None` when the
/// coordinate sits at zero well inside the optimality band and can be shrunk.
#[inline]
fn violation(gp: f64, gn: f64, wj: f64, shrink_bound: f64) -> Option<f64> {
    if wj == 0.0 {
        if gp < 0.0 {
            Some(-gp)
        } else if gn > 0.0 {
            Some(gn)
        } else if gp > shrink_bound && gn < -shrink_bound {
            None
        } else {
            Some(0.0)
        }
    } else if wj > 0.0 {
        Some(gp.abs())
    } else {
        Some(gn.abs())
    }
}

/// L1-regularized squared-hinge SVC:
/// `min_w |w|_1 + sum_i C_i max(0, 1 - y_i w'x_i)^2`.
pub(crate) fn solve_l1r_l2_svc(
    prob: &SubProblem,
    w: &mut [f64],
    eps: f64,
    cp: f64,
    cn: f64,
    rng: &mut StdRng,
    out: &Printer,
) {
    let l = prob.len();
    let w_size = prob.n;
    let c = [cn, 0.0, cp];

    // column values pre-multiplied by the row label
    let mut columns = transpose(prob);
    for column in columns.iter_mut() {
        for (i, value) in column.iter_mut() {
            *value *= prob.y[*i];
        }
    }

    // b_i = 1 - y_i w'x_i
    let mut b = vec![1.0; l];
    let mut index: Vec<usize> = (0..w_size).collect();
    w.iter_mut().for_each(|v| *v = 0.0);

    let mut iter = 0;
    let mut active_size = w_size;
    let mut gmax_old = f64::INFINITY;
    let mut gmax_init = 0.0;

    while iter < MAX_ITER {
        let mut gmax_new: f64 = 0.0;
        shuffle(&mut index[..active_size], rng);

        let mut s = 0;
        while s < active_size {
            let j = index[s];
            let column = &columns[j];

            let mut g_loss = 0.0;
            let mut h = 0.0;
            for &(i, value) in column {
                if b[i] > 0.0 {
                    let tmp = c[geti(prob.y[i])] * value;
                    g_loss -= tmp * b[i];
                    h += tmp * value;
                }
            }
            g_loss *= 2.0;
            let g = g_loss;
            let h = (2.0 * h).max(1.0e-12);

            let gp = g + 1.0;
            let gn = g - 1.0;
            match violation(gp, gn, w[j], gmax_old / l as f64) {
                Some(v) => gmax_new = gmax_new.max(v),
                None => {
                    active_size -= 1;
                    index.swap(s, active_size);
                    continue;
                }
            }

            let mut d = newton_direction(gp, gn, h, w[j]);
            if d.abs() < 1.0e-12 {
                s += 1;
                continue;
            }

            let mut delta = (w[j] + d).abs() - w[j].abs() + g * d;
            let mut d_old = 0.0;
            let mut loss_old = 0.0;
            let mut num_linesearch = 0;
            while num_linesearch < MAX_NUM_LINESEARCH {
                let d_diff = d_old - d;
                let mut cond = (w[j] + d).abs() - w[j].abs() - SIGMA * delta;

                let mut loss_new = 0.0;
                for &(i, value) in column {
                    let ci = c[geti(prob.y[i])];
                    if num_linesearch == 0 && b[i] > 0.0 {
                        loss_old += ci * b[i] * b[i];
                    }
                    let b_new = b[i] + d_diff * value;
                    b[i] = b_new;
                    if b_new > 0.0 {
                        loss_new += ci * b_new * b_new;
                    }
                }

                cond += loss_new - loss_old;
                if cond <= 0.0 {
                    break;
                }
                d_old = d;
                d *= 0.5;
                delta *= 0.5;
                num_linesearch += 1;
            }

            w[j] += d;

            if num_linesearch >= MAX_NUM_LINESEARCH {
                // b drifted from w: rebuild it
                out.info(format_args!("#"));
                b.iter_mut().for_each(|v| *v = 1.0);
                for (k, column) in columns.iter().enumerate() {
                    if w[k] == 0.0 {
                        continue;
                    }
                    for &(i, value) in column {
                        b[i] -= w[k] * value;
                    }
                }
            }
            s += 1;
        }

        if iter == 0 {
            gmax_init = gmax_new;
        }
        iter += 1;
        if iter % 10 == 0 {
            out.info(format_args!("."));
        }

        if gmax_new <= eps * gmax_init {
            if active_size == w_size {
                break;
            }
            active_size = w_size;
            out.info(format_args!("*"));
            gmax_old = f64::INFINITY;
            continue;
        }
        gmax_old = gmax_new;
    }

    out.info(format_args!("optimization finished, #iter = {}", iter));
    if iter >= MAX_ITER {
        out.info(format_args!("WARNING: reaching max number of iterations"));
    }

    let mut v = 0.0;
    let mut nnz = 0;
    for &wj in w.iter() {
        if wj != 0.0 {
            v += wj.abs();
            nnz += 1;
        }
    }
    for i in 0..l {
        if b[i] > 0.0 {
            v += c[geti(prob.y[i])] * b[i] * b[i];
        }
    }
    out.info(format_args!("Objective value = {}", v));
    out.info(format_args!("#nonzeros/#features = {}/{}", nnz, w_size));
}

/// L1-regularized logistic regression:
/// `min_w |w|_1 + sum_i C_i log(1 + exp(-y_i w'x_i))`.
pub(crate) fn solve_l1r_lr(
    prob: &SubProblem,
    w: &mut [f64],
    eps: f64,
    cp: f64,
    cn: f64,
    rng: &mut StdRng,
    out: &Printer,
) {
    let l = prob.len();
    let w_size = prob.n;
    let c = [cn, 0.0, cp];
    let columns = transpose(prob);

    let mut exp_wtx = vec![1.0; l];
    let mut exp_wtx_new = vec![0.0; l];
    let mut index: Vec<usize> = (0..w_size).collect();
    let mut xjneg_sum = vec![0.0; w_size];
    w.iter_mut().for_each(|v| *v = 0.0);

    for (j, column) in columns.iter().enumerate() {
        for &(i, value) in column {
            if prob.y[i] < 0.0 {
                xjneg_sum[j] += c[geti(prob.y[i])] * value;
            }
        }
    }

    let mut iter = 0;
    let mut active_size = w_size;
    let mut gmax_old = f64::INFINITY;
    let mut gmax_init = 0.0;

    while iter < MAX_ITER {
        let mut gmax_new: f64 = 0.0;
        shuffle(&mut index[..active_size], rng);

        let mut s = 0;
        while s < active_size {
            let j = index[s];
            let column = &columns[j];

            let mut sum2 = 0.0;
            let mut h = 0.0;
            for &(i, value) in column {
                let e = exp_wtx[i];
                let tmp1 = value / (1.0 + e);
                let tmp2 = c[geti(prob.y[i])] * tmp1;
                sum2 += tmp2;
                h += tmp1 * tmp2 * e;
            }
            let g = -sum2 + xjneg_sum[j];

            let gp = g + 1.0;
            let gn = g - 1.0;
            match violation(gp, gn, w[j], gmax_old / l as f64) {
                Some(v) => gmax_new = gmax_new.max(v),
                None => {
                    active_size -= 1;
                    index.swap(s, active_size);
                    continue;
                }
            }

            let mut d = newton_direction(gp, gn, h, w[j]);
            if d.abs() < 1.0e-12 {
                s += 1;
                continue;
            }
            d = d.clamp(-10.0, 10.0);

            let mut delta = (w[j] + d).abs() - w[j].abs() + g * d;
            let mut num_linesearch = 0;
            while num_linesearch < MAX_NUM_LINESEARCH {
                let mut cond = (w[j] + d).abs() - w[j].abs() - SIGMA * delta;
                cond += d * xjneg_sum[j];
                for (k, &(i, value)) in column.iter().enumerate() {
                    let exp_dx = (d * value).exp();
                    exp_wtx_new[k] = exp_wtx[i] * exp_dx;
                    cond += c[geti(prob.y[i])]
                        * ((1.0 + exp_wtx_new[k]) / (exp_dx + exp_wtx_new[k])).ln();
                }

                if cond <= 0.0 {
                    for (k, &(i, _)) in column.iter().enumerate() {
                        exp_wtx[i] = exp_wtx_new[k];
                    }
                    break;
                }
                d *= 0.5;
                delta *= 0.5;
                num_linesearch += 1;
            }

            w[j] += d;

            if num_linesearch >= MAX_NUM_LINESEARCH {
                out.info(format_args!("#"));
                exp_wtx.iter_mut().for_each(|v| *v = 0.0);
                for (k, column) in columns.iter().enumerate() {
                    if w[k] == 0.0 {
                        continue;
                    }
                    for &(i, value) in column {
                        exp_wtx[i] += w[k] * value;
                    }
                }
                exp_wtx.iter_mut().for_each(|v| *v = v.exp());
            }
            s += 1;
        }

        if iter == 0 {
            gmax_init = gmax_new;
        }
        iter += 1;
        if iter % 10 == 0 {
            out.info(format_args!("."));
        }

        if gmax_new <= eps * gmax_init {
            if active_size == w_size {
                break;
            }
            active_size = w_size;
            out.info(format_args!("*"));
            gmax_old = f64::INFINITY;
            continue;
        }
        gmax_old = gmax_new;
    }

    out.info(format_args!("optimization finished, #iter = {}", iter));
    if iter >= MAX_ITER {
        out.info(format_args!("WARNING: reaching max number of iterations"));
    }

    let mut v = 0.0;
    let mut nnz = 0;
    for &wj in w.iter() {
        if wj != 0.0 {
            v += wj.abs();
            nnz += 1;
        }
    }
    for i in 0..l {
        let ci = c[geti(prob.y[i])];
        if prob.y[i] > 0.0 {
            v += ci * (1.0 + 1.0 / exp_wtx[i]).ln();
        } else {
            v += ci * (1.0 + exp_wtx[i]).ln();
        }
    }
    out.info(format_args!("Objective value = {}", v));
    out.info(format_args!("#nonzeros/#features = {}/{}", nnz, w_size));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::encode_row;

    #[test]
    fn newton_direction_soft_thresholds() {
        // gradient inside the band at zero: stay at zero
        assert_eq!(newton_direction(0.5, -1.5, 2.0, 0.0), 0.0);
        assert_eq!(newton_direction(-1.0, -3.0, 2.0, 0.0), 0.5);
        assert_eq!(newton_direction(3.0, 1.0, 2.0, 0.0), -0.5);
    }

    #[test]
    fn transpose_groups_rows_by_feature() {
        let rows = vec![encode_row(&[1.0, 0.0], 0.0), encode_row(&[2.0, 3.0], 0.0)];
        let prob = SubProblem {
            x: rows.iter().map(|r| r.as_slice()).collect(),
            y: vec![1.0, -1.0],
            n: 2,
        };
        let columns = transpose(&prob);
        assert_eq!(columns[0], vec![(0, 1.0), (1, 2.0)]);
        assert_eq!(columns[1], vec![(1, 3.0)]);
    }
}
