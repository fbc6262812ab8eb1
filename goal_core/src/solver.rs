//! Reference product-mix oracle.
//!
//! Solves the two-product, three-stage linear program
//!
//! ```text
//! maximize   p_a * a + p_b * b
//! subject to h_a[s] * a + h_b[s] * b <= capacity[s]   for s in stages
//!            0 <= a <= demand_a
//!            0 <= b <= demand_b
//! ```
//!
//! by vertex enumeration. With two decision variables the optimum sits on a
//! vertex of the feasible polygon, and every vertex is the intersection of
//! two constraint boundaries, so solving each 2x2 system and keeping the
//! best feasible point is exact.

use crate::oracle::{Oracle, OracleError, OracleRequest, OracleResponse};
use crate::scenario::Stage;
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

/// Feasibility tolerance for vertex checks (relative to the constraint rhs).
const FEASIBILITY_TOL: f64 = 1e-9;

/// Determinant below which two boundaries are treated as parallel.
const PARALLEL_TOL: f64 = 1e-12;

/// Hours each product spends in each stage, in routing order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Routing {
    /// Hours per unit of product A: [heat, machining, assembly]
    pub product_a: [f64; 3],

    /// Hours per unit of product B: [heat, machining, assembly]
    pub product_b: [f64; 3],
}

impl Default for Routing {
    fn default() -> Self {
        Self {
            product_a: [2.0, 1.0, 1.5],
            product_b: [1.0, 1.5, 1.0],
        }
    }
}

/// Half-plane `coef . x <= rhs`.
#[derive(Debug, Clone, Copy)]
struct Constraint {
    coef: Vector2<f64>,
    rhs: f64,
}

impl Constraint {
    fn new(a: f64, b: f64, rhs: f64) -> Self {
        Self {
            coef: Vector2::new(a, b),
            rhs,
        }
    }

    fn holds(&self, x: &Vector2<f64>) -> bool {
        self.coef.dot(x) <= self.rhs + FEASIBILITY_TOL * self.rhs.abs().max(1.0)
    }
}

/// Vertex-enumeration solver for the product-mix problem.
#[derive(Debug, Clone, Default)]
pub struct ProductMixSolver {
    routing: Routing,
}

impl ProductMixSolver {
    /// Creates a solver with the default routing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a solver with a custom routing.
    pub fn with_routing(routing: Routing) -> Self {
        Self { routing }
    }

    /// Returns the routing in use.
    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    fn check_request(request: &OracleRequest) -> Result<[f64; 3], OracleError> {
        let capacities = [
            request.heat_treatment_capacity,
            request.machining_capacity,
            request.assembly_capacity,
        ];
        for (stage, cap) in Stage::ALL.iter().zip(capacities) {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(OracleError::Infeasible(format!(
                    "{} capacity {} is not positive",
                    stage, cap
                )));
            }
        }
        for (label, demand) in [("A", request.demand_a), ("B", request.demand_b)] {
            if !demand.is_finite() || demand < 0.0 {
                return Err(OracleError::Infeasible(format!(
                    "demand {} = {} is negative",
                    label, demand
                )));
            }
        }
        if !request.profit_a.is_finite() || !request.profit_b.is_finite() {
            return Err(OracleError::Infeasible("profit is not finite".to_string()));
        }
        Ok(capacities)
    }

    fn constraints(&self, request: &OracleRequest, capacities: &[f64; 3]) -> Vec<Constraint> {
        let mut constraints: Vec<Constraint> = Stage::ALL
            .iter()
            .map(|s| {
                let i = s.index();
                Constraint::new(self.routing.product_a[i], self.routing.product_b[i], capacities[i])
            })
            .collect();

        constraints.push(Constraint::new(1.0, 0.0, request.demand_a));
        constraints.push(Constraint::new(0.0, 1.0, request.demand_b));
        constraints.push(Constraint::new(-1.0, 0.0, 0.0));
        constraints.push(Constraint::new(0.0, -1.0, 0.0));
        constraints
    }
}

impl Oracle for ProductMixSolver {
    fn solve(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let capacities = Self::check_request(request)?;
        let constraints = self.constraints(request, &capacities);
        let profit = Vector2::new(request.profit_a, request.profit_b);

        let mut best: Option<(Vector2<f64>, f64)> = None;

        for i in 0..constraints.len() {
            for j in (i + 1)..constraints.len() {
                let (ci, cj) = (constraints[i], constraints[j]);
                let m = Matrix2::new(ci.coef.x, ci.coef.y, cj.coef.x, cj.coef.y);
                if m.determinant().abs() < PARALLEL_TOL {
                    continue;
                }
                let Some(inv) = m.try_inverse() else {
                    continue;
                };
                let vertex = inv * Vector2::new(ci.rhs, cj.rhs);
                if !constraints.iter().all(|c| c.holds(&vertex)) {
                    continue;
                }

                // Snap round-off below zero back onto the axes
                let vertex = vertex.map(|v| v.max(0.0));
                let value = profit.dot(&vertex);

                let improves = match best {
                    None => true,
                    Some((_, current)) => value > current + FEASIBILITY_TOL * current.abs().max(1.0),
                };
                if improves {
                    best = Some((vertex, value));
                }
            }
        }

        // The origin is always feasible once capacities are positive
        let (mix, total_throughput) =
            best.ok_or_else(|| OracleError::Infeasible("empty feasible region".to_string()))?;

        let mut utilization = [0.0; 3];
        for stage in Stage::ALL {
            let i = stage.index();
            let hours = self.routing.product_a[i] * mix.x + self.routing.product_b[i] * mix.y;
            utilization[i] = (hours / capacities[i] * 100.0).clamp(0.0, 100.0);
        }

        let mut bottleneck = Stage::HeatTreatment;
        for stage in Stage::ALL {
            if utilization[stage.index()] > utilization[bottleneck.index()] {
                bottleneck = stage;
            }
        }

        Ok(OracleResponse {
            total_throughput,
            product_a: mix.x,
            product_b: mix.y,
            bottleneck,
            heat_treatment_utilization: utilization[Stage::HeatTreatment.index()],
        })
    }

    fn name(&self) -> &str {
        "ProductMixSolver"
    }
}
