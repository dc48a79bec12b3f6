mod integrator;
mod queue;
mod reconciliation;

pub use integrator::{FlightIntegrator, Integrator, VehicleConfig};
pub use queue::{DEFAULT_PENDING_CAPACITY, PendingInputQueue};
pub use reconciliation::{ReconcileOutcome, ReconcileReport, ReconcileState, Reconciler};
