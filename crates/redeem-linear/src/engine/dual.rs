//! Dual coordinate descent for the L2-regularized problems.
//!
//! Both solvers update one dual variable at a time and keep the primal
//! vector `w = sum_i y_i alpha_i x_i` in sync.
use rand::rngs::StdRng;
use rand::Rng;

use crate::engine::{Printer, SubProblem};
use crate::sparse::{axpy, dot, squared_norm};

const MAX_ITER: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SvcLoss {
    /// Hinge loss, box constraint `0 <= alpha_i <= C_i`.
    L1,
    /// Squared hinge loss, `alpha_i >= 0` with a diagonal term `1 / (2 C_i)`.
    L2,
}

/// Index into the per-class constant tables: 0 for `y = -1`, 2 for `y = +1`.
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

/// Dual coordinate descent for L1- and L2-loss SVC with shrinking.
///
/// ```text
/// min_alpha  0.5 (alpha^T (Q + D) alpha) - e^T alpha
///    s.t.    0 <= alpha_i <= upper_bound_i
/// ```
pub(crate) fn solve_l2r_l1l2_svc(
    prob: &SubProblem,
    w: &mut [f64],
    eps: f64,
    cp: f64,
    cn: f64,
    loss: SvcLoss,
    rng: &mut StdRng,
    out: &Printer,
) {
    let l = prob.len();
    let (diag, upper_bound) = match loss {
        SvcLoss::L2 => ([0.5 / cn, 0.0, 0.5 / cp], [f64::INFINITY, 0.0, f64::INFINITY]),
        SvcLoss::L1 => ([0.0, 0.0, 0.0], [cn, 0.0, cp]),
    };

    let mut alpha = vec![0.0; l];
    let mut qd = vec![0.0; l];
    let mut index: Vec<usize> = (0..l).collect();
    w.iter_mut().for_each(|v| *v = 0.0);

    for i in 0..l {
        qd[i] = diag[geti(prob.y[i])] + squared_norm(prob.x[i]);
    }

    let mut iter = 0;
    let mut active_size = l;
    let mut pg_max_old = f64::INFINITY;
    let mut pg_min_old = f64::NEG_INFINITY;

    while iter < MAX_ITER {
        let mut pg_max_new = f64::NEG_INFINITY;
        let mut pg_min_new = f64::INFINITY;

        shuffle(&mut index[..active_size], rng);

        let mut s = 0;
        while s < active_size {
            let i = index[s];
            let yi = prob.y[i];
            let xi = prob.x[i];
            let k = geti(yi);

            let g = yi * dot(w, xi) - 1.0 + alpha[i] * diag[k];
            let c = upper_bound[k];

            let mut pg = 0.0;
            if alpha[i] == 0.0 {
                if g > pg_max_old {
                    active_size -= 1;
                    index.swap(s, active_size);
                    continue;
                } else if g < 0.0 {
                    pg = g;
                }
            } else if alpha[i] == c {
                if g < pg_min_old {
                    active_size -= 1;
                    index.swap(s, active_size);
                    continue;
                } else if g > 0.0 {
                    pg = g;
                }
            } else {
                pg = g;
            }

            pg_max_new = pg_max_new.max(pg);
            pg_min_new = pg_min_new.min(pg);

            if pg.abs() > 1.0e-12 {
                let alpha_old = alpha[i];
                alpha[i] = (alpha[i] - g / qd[i]).max(0.0).min(c);
                let d = (alpha[i] - alpha_old) * yi;
                axpy(d, xi, w);
            }
            s += 1;
        }

        iter += 1;
        if iter % 10 == 0 {
            out.info(format_args!("."));
        }

        if pg_max_new - pg_min_new <= eps {
            if active_size == l {
                break;
            }
            active_size = l;
            out.info(format_args!("*"));
            pg_max_old = f64::INFINITY;
            pg_min_old = f64::NEG_INFINITY;
            continue;
        }
        pg_max_old = if pg_max_new <= 0.0 { f64::INFINITY } else { pg_max_new };
        pg_min_old = if pg_min_new >= 0.0 { f64::NEG_INFINITY } else { pg_min_new };
    }

    out.info(format_args!("optimization finished, #iter = {}", iter));
    if iter >= MAX_ITER {
        out.info(format_args!(
            "WARNING: reaching max number of iterations; using -s 2 may be faster"
        ));
    }

    let mut v = 0.5 * w.iter().map(|x| x * x).sum::<f64>();
    let mut n_sv = 0;
    for i in 0..l {
        let k = geti(prob.y[i]);
        v += alpha[i] * (alpha[i] * diag[k] - 2.0);
        if alpha[i] > 0.0 {
            n_sv += 1;
        }
    }
    out.info(format_args!("Objective value = {}", v / 2.0));
    out.info(format_args!("nSV = {}", n_sv));
}

/// Dual coordinate descent for L2-regularized logistic regression.
///
/// Each pair `(alpha_2i, alpha_2i+1)` sums to `C_i`; the one-variable
/// sub-problem is solved with a safeguarded Newton iteration.
pub(crate) fn solve_l2r_lr_dual(
    prob: &SubProblem,
    w: &mut [f64],
    eps: f64,
    cp: f64,
    cn: f64,
    rng: &mut StdRng,
    out: &Printer,
) {
    let l = prob.len();
    let max_inner_iter = 100;
    let mut innereps = 1.0e-2;
    let innereps_min = eps.min(1.0e-8);
    let upper_bound = [cn, 0.0, cp];

    let mut xtx = vec![0.0; l];
    let mut alpha = vec![0.0; 2 * l];
    let mut index: Vec<usize> = (0..l).collect();
    w.iter_mut().for_each(|v| *v = 0.0);

    for i in 0..l {
        let c = upper_bound[geti(prob.y[i])];
        alpha[2 * i] = (0.001 * c).min(1.0e-8);
        alpha[2 * i + 1] = c - alpha[2 * i];
        xtx[i] = squared_norm(prob.x[i]);
        axpy(prob.y[i] * alpha[2 * i], prob.x[i], w);
    }

    let mut iter = 0;
    while iter < MAX_ITER {
        shuffle(&mut index, rng);
        let mut newton_iter = 0;
        let mut gmax: f64 = 0.0;

        for &i in &index {
            let yi = prob.y[i];
            let xi = prob.x[i];
            let c = upper_bound[geti(yi)];
            let ywtx = yi * dot(w, xi);
            let a = xtx[i];
            let b = ywtx;

            // pick the variable whose Newton step is better conditioned
            let (ind1, ind2, sign) =
                if 0.5 * a * (alpha[2 * i + 1] - alpha[2 * i]) + b < 0.0 {
                    (2 * i + 1, 2 * i, -1.0)
                } else {
                    (2 * i, 2 * i + 1, 1.0)
                };

            let alpha_old = alpha[ind1];
            let mut z = alpha_old;
            if c - z < 0.5 * c {
                z *= 0.1;
            }
            let mut gp = a * (z - alpha_old) + sign * b + (z / (c - z)).ln();
            gmax = gmax.max(gp.abs());

            let eta = 0.1;
            let mut inner_iter = 0;
            while inner_iter <= max_inner_iter {
                if gp.abs() < innereps {
                    break;
                }
                let gpp = a + c / (c - z) / z;
                let tmpz = z - gp / gpp;
                if tmpz <= 0.0 {
                    z *= eta;
                } else {
                    z = tmpz;
                }
                gp = a * (z - alpha_old) + sign * b + (z / (c - z)).ln();
                newton_iter += 1;
                inner_iter += 1;
            }

            if inner_iter > 0 {
                alpha[ind1] = z;
                alpha[ind2] = c - z;
                axpy(sign * (z - alpha_old) * yi, xi, w);
            }
        }

        iter += 1;
        if iter % 10 == 0 {
            out.info(format_args!("."));
        }
        if gmax < eps {
            break;
        }
        if newton_iter <= l / 10 {
            innereps = innereps_min.max(0.1 * innereps);
        }
    }

    out.info(format_args!("optimization finished, #iter = {}", iter));
    if iter >= MAX_ITER {
        out.info(format_args!(
            "WARNING: reaching max number of iterations; using -s 0 may be faster"
        ));
    }

    let mut v = 0.5 * w.iter().map(|x| x * x).sum::<f64>();
    for i in 0..l {
        let c = upper_bound[geti(prob.y[i])];
        v += alpha[2 * i] * alpha[2 * i].ln() + alpha[2 * i + 1] * alpha[2 * i + 1].ln()
            - c * c.ln();
    }
    out.info(format_args!("Objective value = {}", v));
}
