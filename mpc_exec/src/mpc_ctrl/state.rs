//! Implementations for the MpcCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use std::time::Instant;

// Internal
use super::{
    HorizonEval, MpcCtrlError, Params, A_START, CTE_START, DELTA_START, EPSI_START, MAX_STEER_RAD,
    MAX_THROTTLE, N, NUM_CONSTRAINTS, NUM_STATES, NUM_VARS, PSI_START, SOLVE_CPU_TIME_S,
    STATE_BOUND, V_START, X_START, Y_START,
};
use crate::nlp::{self, Options, Status};
use util::{module::State, session::Session};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Offset of each state variable's block in the decision vector, in state
/// vector order.
const STATE_BLOCK_STARTS: [usize; NUM_STATES] = [
    X_START, Y_START, PSI_START, V_START, CTE_START, EPSI_START,
];

/// Margin used when reporting an actuator as saturated.
const SATURATION_MARGIN: f64 = 1.0e-4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Model predictive control module state
#[derive(Default)]
pub struct MpcCtrl {
    pub(crate) params: Params,

    pub(crate) report: StatusReport,
}

/// Input data to model predictive control.
pub struct InputData {
    /// Latency-compensated vehicle state: `x, y, psi, v, cte, epsi`.
    ///
    /// Position and heading are in the vehicle frame, so the first three
    /// entries are zero in nominal use.
    pub state: [f64; NUM_STATES],

    /// Reference curve coefficients, `coeffs[i]` the degree-i coefficient.
    pub coeffs: [f64; 4],
}

/// Output demands from MpcCtrl that the boundary layer must deliver.
#[derive(Clone, Debug)]
pub struct OutputData {
    /// First-step steering demand. Positive steers left.
    ///
    /// Units: radians
    pub steer_rad: f64,

    /// First-step throttle demand, between -1 and +1.
    pub throttle: f64,

    /// Predicted trajectory x coordinates for steps 1..N.
    ///
    /// Units: meters,
    /// Frame: vehicle
    pub traj_x: Vec<f64>,

    /// Predicted trajectory y coordinates for steps 1..N.
    ///
    /// Units: meters,
    /// Frame: vehicle
    pub traj_y: Vec<f64>,
}

/// Status report for MpcCtrl processing.
#[derive(Clone, Copy, Debug)]
pub struct StatusReport {
    /// How the solver finished.
    pub solver_status: Status,

    /// Cost at the returned iterate.
    pub obj_value: f64,

    /// Wall-clock time spent in the solver.
    ///
    /// Units: seconds
    pub solve_time_s: f64,

    /// Solver iterations taken.
    pub iterations: usize,

    /// True if the returned steering demand sits on its bound.
    pub steer_saturated: bool,

    /// True if the returned throttle demand sits on its bound.
    pub throttle_saturated: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for StatusReport {
    fn default() -> Self {
        StatusReport {
            solver_status: Status::Success,
            obj_value: 0.0,
            solve_time_s: 0.0,
            iterations: 0,
            steer_saturated: false,
            throttle_saturated: false,
        }
    }
}

impl State for MpcCtrl {
    type InitData = Params;
    type InitError = MpcCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = MpcCtrlError;

    /// Initialise the MpcCtrl module.
    ///
    /// Expected init data is the cost weight parameters.
    fn init(&mut self, init_data: Self::InitData, _session: &Session)
        -> Result<(), Self::InitError>
    {
        if !init_data
            .weights()
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
        {
            return Err(MpcCtrlError::InvalidWeights(init_data.weights()));
        }

        self.params = init_data;

        Ok(())
    }

    /// Perform one control solve.
    ///
    /// Formulates the horizon NLP for the given state and reference curve
    /// and solves it. A solver finishing with a non-success status is not an
    /// error: the policy is to forward its best iterate rather than invent a
    /// command, so the caller must consult the status report.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        // Clear the status report
        self.report = StatusReport::default();

        if !input_data
            .state
            .iter()
            .chain(input_data.coeffs.iter())
            .all(|v| v.is_finite())
        {
            return Err(MpcCtrlError::NonFiniteInput);
        }

        // Initial guess: zero everywhere except the measured state at
        // horizon index 0
        let mut x0 = vec![0.0; NUM_VARS];

        // Variable bounds: states effectively unbounded, actuators at their
        // physical limits
        let mut x_lower = vec![-STATE_BOUND; NUM_VARS];
        let mut x_upper = vec![STATE_BOUND; NUM_VARS];

        for i in DELTA_START..A_START {
            x_lower[i] = -MAX_STEER_RAD;
            x_upper[i] = MAX_STEER_RAD;
        }
        for i in A_START..NUM_VARS {
            x_lower[i] = -MAX_THROTTLE;
            x_upper[i] = MAX_THROTTLE;
        }

        // Constraint bounds: all residuals pinned to zero, except entry 0 of
        // each block which pins the initial state
        let mut g_bound = vec![0.0; NUM_CONSTRAINTS];

        for (block_start, value) in STATE_BLOCK_STARTS.iter().zip(input_data.state.iter()) {
            x0[*block_start] = *value;
            g_bound[*block_start] = *value;
        }

        let eval = HorizonEval::new(input_data.coeffs, self.params.weights());

        let options = Options {
            max_cpu_time_s: SOLVE_CPU_TIME_S,
            ..Default::default()
        };

        let solve_start = Instant::now();
        let solution = nlp::solve(
            &options, &x0, &x_lower, &x_upper, &g_bound, &g_bound, &eval,
        );
        let solve_time_s = solve_start.elapsed().as_secs_f64();

        let steer_rad = solution.vars[DELTA_START];
        let throttle = solution.vars[A_START];

        self.report = StatusReport {
            solver_status: solution.status,
            obj_value: solution.obj_value,
            solve_time_s,
            iterations: solution.iterations,
            steer_saturated: steer_rad.abs() >= MAX_STEER_RAD - SATURATION_MARGIN,
            throttle_saturated: throttle.abs() >= MAX_THROTTLE - SATURATION_MARGIN,
        };

        let output = OutputData {
            steer_rad,
            throttle,
            traj_x: (1..N).map(|t| solution.vars[X_START + t]).collect(),
            traj_y: (1..N).map(|t| solution.vars[Y_START + t]).collect(),
        };

        trace!(
            "MpcCtrl output: delta = {:.4} rad, a = {:.4}, cost = {:.2}, {:.1} ms",
            output.steer_rad,
            output.throttle,
            solution.obj_value,
            solve_time_s * 1.0e3
        );

        Ok((output, self.report))
    }
}
