//! Energy integration over the observation window.

pub mod integrator;

pub use integrator::{integrate, integrate_table, EnergyIntegrator, EnergyOutcome, Strategy};
