//! Algebraic expression trees and their interval-consistency constraint.
//!
//! An [`Expr`] is built from variable leaves, constants and operator nodes,
//! usually through the `std::ops` operators:
//!
//! ```
//! use statprop_core::{Expr, Store};
//!
//! let mut store = Store::new();
//! let x = store.new_real("x", 0.0, 4.0, 1e-9).unwrap();
//! let e = (Expr::var(x) - 1.0).sqr() / 2.0;
//! assert_eq!(e.to_string(), "(sqr((x0 - 1)) / 2)");
//! ```
//!
//! Posting an expression creates an [`ExprConstraint`], which narrows with
//! the HC4Revise scheme: a forward pass evaluates every node over the current
//! domains, the root is intersected with the target interval, and a backward
//! pass projects each node's interval onto its children.

use core::fmt;
use core::ops::{Add, Div, Mul, Neg, Sub};

use crate::domain::VarId;
use crate::interval::Interval;
use crate::store::Variables;
use crate::traits::Propagator;
use crate::{Result, StatPropError};

/// An algebraic formula over store variables.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(VarId),
    Const(f64),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Sqr(Box<Expr>),
    Sqrt(Box<Expr>),
    Sum(Vec<Expr>),
}

impl Expr {
    pub fn var(id: VarId) -> Expr {
        Expr::Var(id)
    }

    pub fn constant(c: f64) -> Expr {
        Expr::Const(c)
    }

    /// n-ary sum; the empty sum is the constant 0.
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Expr {
        let terms: Vec<Expr> = terms.into_iter().collect();
        if terms.is_empty() {
            Expr::Const(0.0)
        } else {
            Expr::Sum(terms)
        }
    }

    pub fn sqr(self) -> Expr {
        Expr::Sqr(Box::new(self))
    }

    pub fn sqrt(self) -> Expr {
        Expr::Sqrt(Box::new(self))
    }

    /// Distinct variables referenced by the expression, in first-seen order.
    pub fn vars(&self) -> Vec<VarId> {
        let mut out = Vec::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut Vec<VarId>) {
        match self {
            Expr::Var(v) => {
                if !out.contains(v) {
                    out.push(*v);
                }
            }
            Expr::Const(_) => {}
            Expr::Neg(a) | Expr::Sqr(a) | Expr::Sqrt(a) => a.collect_vars(out),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Expr::Sum(terms) => terms.iter().for_each(|t| t.collect_vars(out)),
        }
    }
}

impl From<VarId> for Expr {
    fn from(id: VarId) -> Self {
        Expr::Var(id)
    }
}

impl From<f64> for Expr {
    fn from(c: f64) -> Self {
        Expr::Const(c)
    }
}

macro_rules! binary_op {
    ($trait:ident, $method:ident, $variant:ident) => {
        impl<R: Into<Expr>> $trait<R> for Expr {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                Expr::$variant(Box::new(self), Box::new(rhs.into()))
            }
        }
    };
}

binary_op!(Add, add, Add);
binary_op!(Sub, sub, Sub);
binary_op!(Mul, mul, Mul);
binary_op!(Div, div, Div);

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(v) => write!(f, "x{}", v.index()),
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Neg(a) => write!(f, "-{a}"),
            Expr::Add(a, b) => write!(f, "({a} + {b})"),
            Expr::Sub(a, b) => write!(f, "({a} - {b})"),
            Expr::Mul(a, b) => write!(f, "({a} * {b})"),
            Expr::Div(a, b) => write!(f, "({a} / {b})"),
            Expr::Sqr(a) => write!(f, "sqr({a})"),
            Expr::Sqrt(a) => write!(f, "sqrt({a})"),
            Expr::Sum(terms) => {
                write!(f, "sum(")?;
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// ── Flattened tree ──────────────────────────────────────────────────────────

/// Expression node with children addressed by index into the node arena.
/// Children always precede their parent.
#[derive(Debug, Clone)]
enum Node {
    Var(VarId),
    Const(Interval),
    Neg(usize),
    Add(usize, usize),
    Sub(usize, usize),
    Mul(usize, usize),
    Div(usize, usize),
    Sqr(usize),
    Sqrt(usize),
    Sum(Vec<usize>),
}

fn flatten(expr: &Expr, nodes: &mut Vec<Node>) -> usize {
    let node = match expr {
        Expr::Var(v) => Node::Var(*v),
        Expr::Const(c) => Node::Const(Interval::point(*c)),
        Expr::Neg(a) => Node::Neg(flatten(a, nodes)),
        Expr::Add(a, b) => {
            let (a, b) = (flatten(a, nodes), flatten(b, nodes));
            Node::Add(a, b)
        }
        Expr::Sub(a, b) => {
            let (a, b) = (flatten(a, nodes), flatten(b, nodes));
            Node::Sub(a, b)
        }
        Expr::Mul(a, b) => {
            let (a, b) = (flatten(a, nodes), flatten(b, nodes));
            Node::Mul(a, b)
        }
        Expr::Div(a, b) => {
            let (a, b) = (flatten(a, nodes), flatten(b, nodes));
            Node::Div(a, b)
        }
        Expr::Sqr(a) => Node::Sqr(flatten(a, nodes)),
        Expr::Sqrt(a) => Node::Sqrt(flatten(a, nodes)),
        Expr::Sum(terms) => Node::Sum(terms.iter().map(|t| flatten(t, nodes)).collect()),
    };
    nodes.push(node);
    nodes.len() - 1
}

/// `expr ∈ target`, narrowed by forward/backward interval propagation.
#[derive(Debug, Clone)]
pub struct ExprConstraint {
    nodes: Vec<Node>,
    target: Interval,
    scope: Vec<VarId>,
    text: String,
}

impl ExprConstraint {
    pub fn new(expr: &Expr, target: Interval) -> Self {
        let mut nodes = Vec::new();
        flatten(expr, &mut nodes);
        Self {
            nodes,
            target,
            scope: expr.vars(),
            text: expr.to_string(),
        }
    }

    /// Forward pass: interval of every node under the current domains.
    fn evaluate(&self, vars: &Variables) -> Vec<Interval> {
        let mut vals: Vec<Interval> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let v = match node {
                Node::Var(id) => vars.bounds(*id),
                Node::Const(c) => *c,
                Node::Neg(a) => -vals[*a],
                Node::Add(a, b) => vals[*a] + vals[*b],
                Node::Sub(a, b) => vals[*a] - vals[*b],
                Node::Mul(a, b) => vals[*a] * vals[*b],
                Node::Div(a, b) => vals[*a] / vals[*b],
                Node::Sqr(a) => vals[*a].sqr(),
                Node::Sqrt(a) => vals[*a].sqrt(),
                Node::Sum(children) => children
                    .iter()
                    .fold(Interval::point(0.0), |acc, &c| acc + vals[c]),
            };
            vals.push(v);
        }
        vals
    }

    fn infeasible(&self) -> StatPropError {
        StatPropError::Infeasible(format!("{} ∉ {}", self.text, self.target))
    }
}

fn project(vals: &mut [Interval], idx: usize, by: Interval) -> bool {
    vals[idx] = vals[idx].intersect(&by);
    !vals[idx].is_empty()
}

impl Propagator for ExprConstraint {
    fn label(&self) -> String {
        format!("{} ∈ {}", self.text, self.target)
    }

    fn scope(&self) -> Vec<VarId> {
        self.scope.clone()
    }

    fn propagate(&self, vars: &mut Variables) -> Result<()> {
        let mut vals = self.evaluate(vars);
        let root = vals.len() - 1;
        if !project(&mut vals, root, self.target) {
            return Err(self.infeasible());
        }

        for i in (0..self.nodes.len()).rev() {
            if !backward(&self.nodes[i], vals[i], &mut vals) {
                return Err(self.infeasible());
            }
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Var(id) = node {
                vars.narrow(*id, vals[i])?;
            }
        }
        Ok(())
    }
}

/// Project the interval `v` of `node` onto its children.
fn backward(node: &Node, v: Interval, vals: &mut [Interval]) -> bool {
    match *node {
        Node::Var(_) | Node::Const(_) => true,
        Node::Neg(a) => project(vals, a, -v),
        Node::Add(a, b) => {
            let by = v - vals[b];
            if !project(vals, a, by) {
                return false;
            }
            let by = v - vals[a];
            project(vals, b, by)
        }
        Node::Sub(a, b) => {
            let by = v + vals[b];
            if !project(vals, a, by) {
                return false;
            }
            let by = vals[a] - v;
            project(vals, b, by)
        }
        Node::Mul(a, b) => {
            let by = v / vals[b];
            if !project(vals, a, by) {
                return false;
            }
            let by = v / vals[a];
            project(vals, b, by)
        }
        Node::Div(a, b) => {
            let by = v * vals[b];
            if !project(vals, a, by) {
                return false;
            }
            let by = vals[a] / v;
            project(vals, b, by)
        }
        Node::Sqr(a) => {
            let by = vals[a].sqr_preimage(&v);
            project(vals, a, by)
        }
        Node::Sqrt(a) => {
            let by = v.intersect(&Interval::NON_NEGATIVE).sqr();
            project(vals, a, by)
        }
        Node::Sum(ref children) => project_sum(vals, children, v),
    }
}

fn project_sum(vals: &mut [Interval], children: &[usize], total: Interval) -> bool {
    let n = children.len();
    let mut prefix = vec![Interval::point(0.0); n + 1];
    let mut suffix = vec![Interval::point(0.0); n + 1];
    for k in 0..n {
        prefix[k + 1] = prefix[k] + vals[children[k]];
        suffix[n - k - 1] = suffix[n - k] + vals[children[n - k - 1]];
    }
    children
        .iter()
        .enumerate()
        .all(|(k, &c)| project(vals, c, total - (prefix[k] + suffix[k + 1])))
}
