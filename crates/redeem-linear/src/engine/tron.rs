//! Trust-region Newton method for the L2-regularized primal problems.
//!
//! Each outer step solves the Newton system approximately with conjugate
//! gradient, restricted to a ball of radius `delta` that grows or shrinks
//! depending on how well the quadratic model predicted the actual decrease.
use crate::engine::{Printer, SubProblem};
use crate::sparse::{axpy, dot};

const MAX_ITER: usize = 1000;

/// Twice-differentiable objective the trust-region solver minimizes.
pub(crate) trait Objective {
    fn fun(&mut self, w: &[f64]) -> f64;
    /// Gradient at the point of the last `fun` call.
    fn grad(&mut self, w: &[f64], g: &mut [f64]);
    /// Hessian-vector product at the point of the last `grad` call.
    fn hv(&mut self, s: &[f64], hs: &mut [f64]);
    fn size(&self) -> usize;
}

fn dnrm2(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

fn ddot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

fn daxpy(a: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += a * xi;
    }
}

pub(crate) fn tron(fun: &mut dyn Objective, w: &mut [f64], eps: f64, out: &Printer) {
    let (eta0, eta1, eta2) = (1e-4, 0.25, 0.75);
    let (sigma1, sigma2, sigma3): (f64, f64, f64) = (0.25, 0.5, 4.0);

    let n = fun.size();
    let mut s = vec![0.0; n];
    let mut r = vec![0.0; n];
    let mut g = vec![0.0; n];
    let mut w_new = vec![0.0; n];

    w.iter_mut().for_each(|v| *v = 0.0);
    let mut f = fun.fun(w);
    fun.grad(w, &mut g);
    let mut delta = dnrm2(&g);
    let gnorm1 = delta;
    let mut gnorm = gnorm1;

    let search = gnorm > eps * gnorm1;
    let mut iter = 1;

    while iter <= MAX_ITER && search {
        let cg_iter = trcg(fun, delta, &g, &mut s, &mut r);

        w_new.copy_from_slice(w);
        daxpy(1.0, &s, &mut w_new);

        let gs = ddot(&g, &s);
        let prered = -0.5 * (gs - ddot(&s, &r));
        let fnew = fun.fun(&w_new);

        let actred = f - fnew;

        let snorm = dnrm2(&s);
        if iter == 1 {
            delta = delta.min(snorm);
        }

        let alpha = if fnew - f - gs <= 0.0 {
            sigma3
        } else {
            sigma1.max(-0.5 * (gs / (fnew - f - gs)))
        };

        if actred < eta0 * prered {
            delta = (alpha.max(sigma1) * snorm).min(sigma2 * delta);
        } else if actred < eta1 * prered {
            delta = (sigma1 * delta).max((alpha * snorm).min(sigma2 * delta));
        } else if actred < eta2 * prered {
            delta = (sigma1 * delta).max((alpha * snorm).min(sigma3 * delta));
        } else {
            delta = delta.max((alpha * snorm).min(sigma3 * delta));
        }

        out.info(format_args!(
            "iter {:2} act {:5.3e} pre {:5.3e} delta {:5.3e} f {:5.3e} |g| {:5.3e} CG {:3}",
            iter, actred, prered, delta, f, gnorm, cg_iter
        ));

        if actred > eta0 * prered {
            iter += 1;
            w.copy_from_slice(&w_new);
            f = fnew;
            fun.grad(w, &mut g);
            gnorm = dnrm2(&g);
            if gnorm <= eps * gnorm1 {
                break;
            }
        }
        if f < -1.0e32 {
            out.info(format_args!("WARNING: f < -1.0e+32"));
            break;
        }
        if actred.abs() <= 0.0 && prered <= 0.0 {
            out.info(format_args!("WARNING: actred and prered <= 0"));
            break;
        }
        if actred.abs() <= 1.0e-12 * f.abs() && prered.abs() <= 1.0e-12 * f.abs() {
            out.info(format_args!("WARNING: actred and prered too small"));
            break;
        }
    }
}

/// Truncated conjugate gradient for `H s = -g` inside the trust region.
fn trcg(fun: &mut dyn Objective, delta: f64, g: &[f64], s: &mut [f64], r: &mut [f64]) -> usize {
    let n = g.len();
    let mut d = vec![0.0; n];
    let mut hd = vec![0.0; n];

    for i in 0..n {
        s[i] = 0.0;
        r[i] = -g[i];
        d[i] = r[i];
    }
    let cgtol = 0.1 * dnrm2(g);

    let mut cg_iter = 0;
    let mut r_tr = ddot(r, r);
    loop {
        if dnrm2(r) <= cgtol {
            break;
        }
        cg_iter += 1;
        fun.hv(&d, &mut hd);

        let mut alpha = r_tr / ddot(&d, &hd);
        daxpy(alpha, &d, s);
        if dnrm2(s) > delta {
            // step left the region: back off and move to the boundary
            alpha = -alpha;
            daxpy(alpha, &d, s);

            let std = ddot(s, &d);
            let sts = ddot(s, s);
            let dtd = ddot(&d, &d);
            let dsq = delta * delta;
            let rad = (std * std + dtd * (dsq - sts)).sqrt();
            alpha = if std >= 0.0 {
                (dsq - sts) / (std + rad)
            } else {
                (rad - std) / dtd
            };
            daxpy(alpha, &d, s);
            alpha = -alpha;
            daxpy(alpha, &hd, r);
            break;
        }
        alpha = -alpha;
        daxpy(alpha, &hd, r);
        let rnew_trnew = ddot(r, r);
        let beta = rnew_trnew / r_tr;
        for i in 0..n {
            d[i] = beta * d[i] + r[i];
        }
        r_tr = rnew_trnew;
    }
    cg_iter
}

/// Logistic loss with L2 penalty:
/// `0.5 w'w + sum_i C_i log(1 + exp(-y_i w'x_i))`.
pub(crate) struct L2rLrFun<'a> {
    prob: &'a SubProblem<'a>,
    c: Vec<f64>,
    z: Vec<f64>,
    d: Vec<f64>,
}

impl<'a> L2rLrFun<'a> {
    pub(crate) fn new(prob: &'a SubProblem<'a>, c: Vec<f64>) -> Self {
        let l = prob.len();
        L2rLrFun {
            prob,
            c,
            z: vec![0.0; l],
            d: vec![0.0; l],
        }
    }
}

impl Objective for L2rLrFun<'_> {
    fn fun(&mut self, w: &[f64]) -> f64 {
        let y = &self.prob.y;
        let mut f = 0.5 * ddot(w, w);
        for (i, x) in self.prob.x.iter().enumerate() {
            self.z[i] = dot(w, x);
            let yz = y[i] * self.z[i];
            if yz >= 0.0 {
                f += self.c[i] * (1.0 + (-yz).exp()).ln();
            } else {
                f += self.c[i] * (-yz + (1.0 + yz.exp()).ln());
            }
        }
        f
    }

    fn grad(&mut self, w: &[f64], g: &mut [f64]) {
        let y = &self.prob.y;
        for i in 0..self.prob.len() {
            let sig = 1.0 / (1.0 + (-y[i] * self.z[i]).exp());
            self.d[i] = sig * (1.0 - sig);
            self.z[i] = self.c[i] * (sig - 1.0) * y[i];
        }
        g.copy_from_slice(w);
        for (i, x) in self.prob.x.iter().enumerate() {
            axpy(self.z[i], x, g);
        }
    }

    fn hv(&mut self, s: &[f64], hs: &mut [f64]) {
        hs.copy_from_slice(s);
        for (i, x) in self.prob.x.iter().enumerate() {
            let xs = self.c[i] * self.d[i] * dot(s, x);
            axpy(xs, x, hs);
        }
    }

    fn size(&self) -> usize {
        self.prob.n
    }
}

/// Squared hinge loss with L2 penalty:
/// `0.5 w'w + sum_i C_i max(0, 1 - y_i w'x_i)^2`.
pub(crate) struct L2rL2SvcFun<'a> {
    prob: &'a SubProblem<'a>,
    c: Vec<f64>,
    z: Vec<f64>,
    /// Rows with a positive loss at the last gradient point.
    active: Vec<usize>,
}

impl<'a> L2rL2SvcFun<'a> {
    pub(crate) fn new(prob: &'a SubProblem<'a>, c: Vec<f64>) -> Self {
        let l = prob.len();
        L2rL2SvcFun {
            prob,
            c,
            z: vec![0.0; l],
            active: Vec::with_capacity(l),
        }
    }
}

impl Objective for L2rL2SvcFun<'_> {
    fn fun(&mut self, w: &[f64]) -> f64 {
        let y = &self.prob.y;
        let mut f = 0.5 * ddot(w, w);
        for (i, x) in self.prob.x.iter().enumerate() {
            self.z[i] = y[i] * dot(w, x);
            let d = 1.0 - self.z[i];
            if d > 0.0 {
                f += self.c[i] * d * d;
            }
        }
        f
    }

    fn grad(&mut self, w: &[f64], g: &mut [f64]) {
        let y = &self.prob.y;
        self.active.clear();
        g.copy_from_slice(w);
        for i in 0..self.prob.len() {
            if self.z[i] < 1.0 {
                self.active.push(i);
                let zi = self.c[i] * y[i] * (self.z[i] - 1.0);
                axpy(2.0 * zi, self.prob.x[i], g);
            }
        }
    }

    fn hv(&mut self, s: &[f64], hs: &mut [f64]) {
        hs.copy_from_slice(s);
        for &i in &self.active {
            let x = self.prob.x[i];
            let xs = self.c[i] * dot(s, x);
            axpy(2.0 * xs, x, hs);
        }
    }

    fn size(&self) -> usize {
        self.prob.n
    }
}
