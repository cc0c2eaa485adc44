//! Integrate the power table into one energy total for the observation window.
//!
//! Two strategies, preferred in this order:
//! - **Aligned overlap**: walk rows by wall clock and count only the part of
//!   each row interval that overlaps the observation window
//! - **Whole file**: sum non-negative counter deltas over the entire table
//!   (or the last counter value if no delta is positive), else integrate
//!   power over elapsed time
//!
//! A negative counter delta is a hardware reset: the row's contribution is
//! discarded, never subtracted. Discards are counted for diagnostics.
//!
//! All accumulators advance together in one pass over the rows. A scoped
//! request (core / domain) is integrated the same way and falls back to the
//! package signal when it has no usable column or total.

use crate::aggregator::ingest::{seconds_between, ObservationWindow};
use crate::parser::{ColumnRoleMap, PowerTableReader, PowerTableRow, Scope};
use crate::utils::error::PowerTableError;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::fmt;
use std::io::Read;

/// How the total was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    AlignedOverlap,
    WholeFileCounter,
    /// No positive delta; the last counter reading is the total
    WholeFileLastCounter,
    WholeFilePower,
    /// Energy column present but never held a valid value
    NoValidData,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Strategy::AlignedOverlap => "aligned-overlap",
            Strategy::WholeFileCounter => "whole-file-counter",
            Strategy::WholeFileLastCounter => "whole-file-last-counter",
            Strategy::WholeFilePower => "whole-file-power",
            Strategy::NoValidData => "no-valid-data",
        };
        f.write_str(label)
    }
}

/// Energy over the observation window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyOutcome {
    /// Non-negative total (J)
    pub total_j: f64,
    pub strategy: Strategy,
    /// Scope the total was measured in (package after a fallback)
    pub scope: Scope,
    pub requested_scope: Scope,
    pub scope_degraded: bool,
    /// Negative counter deltas discarded by the chosen strategy
    pub discarded_resets: u64,
    /// Data rows read
    pub rows: u64,
}

/// Which columns one signal reads
#[derive(Debug, Clone, Copy)]
struct SignalColumns {
    energy: bool,
    power: bool,
    elapsed: bool,
}

/// Accumulators for one energy/power signal
#[derive(Debug)]
struct SignalAccumulator {
    columns: SignalColumns,

    aligned_total: f64,
    aligned_used: bool,
    aligned_resets: u64,
    prev_time: Option<DateTime<Utc>>,
    prev_aligned_energy: Option<f64>,
    prev_aligned_power: Option<f64>,

    counter_total: f64,
    counter_resets: u64,
    prev_counter: Option<f64>,

    power_total: f64,
    prev_power_sample: Option<(f64, f64)>,
}

impl SignalAccumulator {
    fn new(columns: SignalColumns) -> Self {
        Self {
            columns,
            aligned_total: 0.0,
            aligned_used: false,
            aligned_resets: 0,
            prev_time: None,
            prev_aligned_energy: None,
            prev_aligned_power: None,
            counter_total: 0.0,
            counter_resets: 0,
            prev_counter: None,
            power_total: 0.0,
            prev_power_sample: None,
        }
    }

    fn has_signal(&self) -> bool {
        self.columns.energy || self.columns.power
    }

    /// Advance every strategy by one row
    fn feed(
        &mut self,
        energy: f64,
        power: f64,
        elapsed: f64,
        wall_clock: Option<DateTime<Utc>>,
        window: Option<&ObservationWindow>,
    ) {
        if let (Some(window), Some(t)) = (window, wall_clock) {
            self.feed_aligned(energy, power, t, window);
        }
        self.feed_counter(energy);
        self.feed_power(power, elapsed);
    }

    /// Aligned overlap integration (energy column preferred over power)
    fn feed_aligned(&mut self, energy: f64, power: f64, t: DateTime<Utc>, window: &ObservationWindow) {
        if self.columns.energy {
            if let (Some(prev_t), Some(prev_e)) = (self.prev_time, self.prev_aligned_energy) {
                let row_duration = seconds_between(prev_t, t);
                if row_duration > 0.0 && !energy.is_nan() {
                    let delta = energy - prev_e;
                    if delta >= 0.0 {
                        let overlap = window.overlap_seconds(prev_t, t);
                        if overlap > 0.0 {
                            self.aligned_total += delta * (overlap / row_duration);
                        }
                        self.aligned_used = true;
                    } else {
                        self.aligned_resets += 1;
                    }
                }
            }
            self.prev_time = Some(t);
            if !energy.is_nan() {
                self.prev_aligned_energy = Some(energy);
            }
        } else if self.columns.power {
            if let (Some(prev_t), Some(prev_p)) = (self.prev_time, self.prev_aligned_power) {
                let row_duration = seconds_between(prev_t, t);
                let overlap = window.overlap_seconds(prev_t, t);
                if row_duration > 0.0 && overlap > 0.0 {
                    self.aligned_total += prev_p.max(0.0) * overlap;
                }
                self.aligned_used = true;
            }
            self.prev_time = Some(t);
            if !power.is_nan() {
                self.prev_aligned_power = Some(power);
            }
        }
    }

    /// Whole-file sum of non-negative counter deltas
    fn feed_counter(&mut self, energy: f64) {
        if !self.columns.energy || energy.is_nan() {
            return;
        }
        if let Some(prev) = self.prev_counter {
            if energy >= prev {
                self.counter_total += energy - prev;
            } else {
                self.counter_resets += 1;
            }
        }
        self.prev_counter = Some(energy);
    }

    /// Whole-file left-endpoint power integration over elapsed time
    fn feed_power(&mut self, power: f64, elapsed: f64) {
        if !self.columns.power || !self.columns.elapsed || power.is_nan() || elapsed.is_nan() {
            return;
        }
        if let Some((prev_t, prev_p)) = self.prev_power_sample {
            self.power_total += (elapsed - prev_t).max(0.0) * prev_p.max(0.0);
        }
        self.prev_power_sample = Some((elapsed, power));
    }

    /// Pick the best strategy; `None` when no usable column exists
    fn resolve(&self) -> Option<(f64, Strategy, u64)> {
        if self.aligned_used && self.aligned_total > 0.0 {
            return Some((self.aligned_total, Strategy::AlignedOverlap, self.aligned_resets));
        }

        if self.columns.energy {
            if self.counter_total > 0.0 {
                return Some((self.counter_total, Strategy::WholeFileCounter, self.counter_resets));
            }
            if let Some(last) = self.prev_counter {
                return Some((last.max(0.0), Strategy::WholeFileLastCounter, self.counter_resets));
            }
        }

        if self.columns.power && self.columns.elapsed {
            return Some((self.power_total, Strategy::WholeFilePower, 0));
        }

        // Power walked by wall clock but nothing positive inside the window
        if self.columns.power && self.aligned_used {
            return Some((0.0, Strategy::AlignedOverlap, self.aligned_resets));
        }

        if self.columns.energy {
            return Some((0.0, Strategy::NoValidData, 0));
        }

        None
    }
}

/// Streaming energy integrator
///
/// **Public** - feed every row once, then call `finish`
pub struct EnergyIntegrator {
    window: Option<ObservationWindow>,
    requested_scope: Scope,
    scope_degraded: bool,
    header: String,
    package: SignalAccumulator,
    scoped: Option<SignalAccumulator>,
    rows: u64,
}

impl EnergyIntegrator {
    /// Prepare accumulators for the resolved columns
    ///
    /// # Arguments
    /// * `roles` - Column roles (including the scope resolution)
    /// * `window` - Observation window, `None` when no samples were seen
    pub fn new(roles: &ColumnRoleMap, window: Option<ObservationWindow>) -> Self {
        let wall_clock = roles.wall_clock().is_some();
        let elapsed = roles.elapsed().is_some();

        let package = SignalAccumulator::new(SignalColumns {
            energy: roles.energy().is_some(),
            power: roles.power().is_some(),
            elapsed,
        });

        let scoped = match roles.scope() {
            Scope::Package => None,
            _ => Some(SignalAccumulator::new(SignalColumns {
                energy: roles.scoped_energy().is_some(),
                power: roles.scoped_power().is_some(),
                elapsed,
            })),
        };

        // Alignment needs a wall clock and a window of positive length
        let window = window.filter(|w| wall_clock && !w.is_degenerate());
        if window.is_none() {
            debug!("Aligned integration unavailable (no wall-clock column or degenerate window)");
        }

        Self {
            window,
            requested_scope: roles.scope(),
            scope_degraded: roles.scope_degraded(),
            header: roles.header().to_string(),
            package,
            scoped,
            rows: 0,
        }
    }

    /// Advance all accumulators by one row
    pub fn feed(&mut self, row: &PowerTableRow) {
        self.rows += 1;
        let window = self.window.as_ref();

        self.package
            .feed(row.energy_j, row.power_w, row.elapsed_s, row.wall_clock, window);

        if let Some(scoped) = self.scoped.as_mut() {
            scoped.feed(
                row.scoped_energy_j,
                row.scoped_power_w,
                row.elapsed_s,
                row.wall_clock,
                window,
            );
        }
    }

    /// Choose the strategy and produce the total
    ///
    /// # Errors
    /// * `PowerTableError::EmptyInput` - no rows were fed
    /// * `PowerTableError::MissingColumns` - no usable energy/power signal
    pub fn finish(self) -> Result<EnergyOutcome, PowerTableError> {
        if self.rows == 0 {
            return Err(PowerTableError::EmptyInput);
        }

        let mut scope_degraded = self.scope_degraded;

        if let Some(scoped) = &self.scoped {
            match scoped.resolve() {
                Some((total, strategy, resets)) if total > 0.0 => {
                    info!(
                        "Integrated {:.3} J from {} columns ({})",
                        total, self.requested_scope, strategy
                    );
                    return Ok(self.outcome(total, strategy, self.requested_scope, scope_degraded, resets));
                }
                _ => {
                    let reason = if scoped.has_signal() {
                        "yielded no energy"
                    } else {
                        "not found"
                    };
                    warn!(
                        "{} power/energy columns {}, falling back to package energy",
                        self.requested_scope, reason
                    );
                    scope_degraded = true;
                }
            }
        }

        let Some((total, strategy, resets)) = self.package.resolve() else {
            return Err(PowerTableError::MissingColumns { header: self.header });
        };

        match strategy {
            Strategy::AlignedOverlap => {
                if let Some(w) = &self.window {
                    info!(
                        "Aligned energy over rows by System Time within window [{} .. {}]",
                        w.start.to_rfc3339(),
                        w.end.to_rfc3339()
                    );
                }
                if total <= 0.0 {
                    warn!("Power readings inside the observation window integrate to 0 J");
                }
            }
            Strategy::NoValidData => {
                warn!("Energy column holds no valid values; total energy is 0 J");
            }
            _ => {
                warn!("Falling back to whole-file energy integration ({})", strategy);
            }
        }

        if resets > 0 {
            debug!("Discarded {} negative counter deltas as resets", resets);
        }

        Ok(self.outcome(total, strategy, Scope::Package, scope_degraded, resets))
    }

    fn outcome(
        &self,
        total_j: f64,
        strategy: Strategy,
        scope: Scope,
        scope_degraded: bool,
        discarded_resets: u64,
    ) -> EnergyOutcome {
        EnergyOutcome {
            total_j,
            strategy,
            scope,
            requested_scope: self.requested_scope,
            scope_degraded,
            discarded_resets,
            rows: self.rows,
        }
    }
}

/// Integrate already-parsed rows
///
/// **Public** - convenience wrapper over `EnergyIntegrator`
pub fn integrate<'a, I>(
    rows: I,
    roles: &ColumnRoleMap,
    window: Option<ObservationWindow>,
) -> Result<EnergyOutcome, PowerTableError>
where
    I: IntoIterator<Item = &'a PowerTableRow>,
{
    let mut integrator = EnergyIntegrator::new(roles, window);
    for row in rows {
        integrator.feed(row);
    }
    integrator.finish()
}

/// Stream a power table straight into the integrator
///
/// **Public** - main entry point used by the attribute command
pub fn integrate_table<R: Read>(
    mut reader: PowerTableReader<R>,
    window: Option<ObservationWindow>,
) -> Result<EnergyOutcome, PowerTableError> {
    let mut integrator = EnergyIntegrator::new(reader.roles(), window);
    for row in reader.by_ref() {
        integrator.feed(&row?);
    }
    integrator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_power_table, ColumnRules, WallClockParser};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn clock() -> WallClockParser {
        WallClockParser::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
    }

    fn table(csv: &str, scope: Scope) -> (ColumnRoleMap, Vec<PowerTableRow>) {
        let rules = ColumnRules::new(scope.core_index()).unwrap();
        parse_power_table(csv, &rules, scope, clock()).unwrap()
    }

    fn window(from: &str, to: &str) -> Option<ObservationWindow> {
        let c = clock();
        Some(ObservationWindow::new(c.parse(from).unwrap(), c.parse(to).unwrap()))
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_counter_reset_is_discarded() {
        let csv = "Elapsed Time (sec),Cumulative Processor Energy_0(Joules)\n\
                   0,0\n1,5\n2,12\n3,9\n4,20\n";
        let (roles, rows) = table(csv, Scope::Package);
        let outcome = integrate(&rows, &roles, None).unwrap();

        assert!(close(outcome.total_j, 23.0));
        assert_eq!(outcome.strategy, Strategy::WholeFileCounter);
        assert_eq!(outcome.discarded_resets, 1);
    }

    #[test]
    fn test_aligned_counter_overlap() {
        let csv = "System Time,Cumulative Processor Energy_0(Joules)\n\
                   12:00:00:000,0\n12:00:10:000,100\n12:00:20:000,300\n";
        let (roles, rows) = table(csv, Scope::Package);
        let outcome = integrate(&rows, &roles, window("12:00:05:000", "12:00:15:000")).unwrap();

        assert!(close(outcome.total_j, 150.0));
        assert_eq!(outcome.strategy, Strategy::AlignedOverlap);
    }

    #[test]
    fn test_aligned_power_left_endpoint() {
        let csv = "System Time,Processor Power_0(Watt)\n\
                   12:00:00:000,10\n12:00:10:000,20\n12:00:20:000,40\n";
        let (roles, rows) = table(csv, Scope::Package);
        let outcome = integrate(&rows, &roles, window("12:00:05:000", "12:00:15:000")).unwrap();

        // 10 W * 5 s + 20 W * 5 s
        assert!(close(outcome.total_j, 150.0));
        assert_eq!(outcome.strategy, Strategy::AlignedOverlap);
    }

    #[test]
    fn test_aligned_reset_discarded() {
        let csv = "System Time,Cumulative Processor Energy_0(Joules)\n\
                   12:00:00:000,50\n12:00:10:000,60\n12:00:20:000,5\n12:00:30:000,25\n";
        let (roles, rows) = table(csv, Scope::Package);
        let outcome = integrate(&rows, &roles, window("12:00:00:000", "12:00:30:000")).unwrap();

        assert!(close(outcome.total_j, 30.0));
        assert_eq!(outcome.discarded_resets, 1);
    }

    #[test]
    fn test_window_outside_table_falls_back_to_whole_file() {
        let csv = "System Time,Cumulative Processor Energy_0(Joules)\n\
                   12:00:00:000,0\n12:00:10:000,100\n";
        let (roles, rows) = table(csv, Scope::Package);
        let outcome = integrate(&rows, &roles, window("13:00:00:000", "13:00:10:000")).unwrap();

        assert!(close(outcome.total_j, 100.0));
        assert_eq!(outcome.strategy, Strategy::WholeFileCounter);
    }

    #[test]
    fn test_degenerate_window_skips_alignment() {
        let csv = "System Time,Cumulative Processor Energy_0(Joules)\n\
                   12:00:00:000,0\n12:00:10:000,100\n";
        let (roles, rows) = table(csv, Scope::Package);
        let outcome = integrate(&rows, &roles, window("12:00:05:000", "12:00:05:000")).unwrap();

        assert_eq!(outcome.strategy, Strategy::WholeFileCounter);
    }

    #[test]
    fn test_last_counter_when_no_positive_delta() {
        let csv = "Elapsed Time,Cumulative Processor Energy(Joules)\n0,42\n1,42\n";
        let (roles, rows) = table(csv, Scope::Package);
        let outcome = integrate(&rows, &roles, None).unwrap();

        assert!(close(outcome.total_j, 42.0));
        assert_eq!(outcome.strategy, Strategy::WholeFileLastCounter);
    }

    #[test]
    fn test_whole_file_power_integration() {
        let csv = "Elapsed Time (sec),Processor Power_0(Watt)\n\
                   0.0,10\n0.5,-3\n1.5,20\n2.0,5\n";
        let (roles, rows) = table(csv, Scope::Package);
        let outcome = integrate(&rows, &roles, None).unwrap();

        // 10*0.5 + max(0,-3)*1.0 + 20*0.5
        assert!(close(outcome.total_j, 15.0));
        assert_eq!(outcome.strategy, Strategy::WholeFilePower);
    }

    #[test]
    fn test_unparseable_cells_are_skipped() {
        let csv = "Elapsed Time,Cumulative Processor Energy(Joules)\n0,1\n1,n/a\n2,4\n";
        let (roles, rows) = table(csv, Scope::Package);
        let outcome = integrate(&rows, &roles, None).unwrap();
        assert!(close(outcome.total_j, 3.0));
    }

    #[test]
    fn test_power_without_time_is_missing_columns() {
        let csv = "Processor Power(Watt)\n10\n20\n";
        let (roles, rows) = table(csv, Scope::Package);
        let err = integrate(&rows, &roles, None).unwrap_err();
        assert!(matches!(err, PowerTableError::MissingColumns { .. }));
    }

    #[test]
    fn test_no_rows_is_empty_input() {
        let csv = "Elapsed Time,Processor Power(Watt)\n";
        let rules = ColumnRules::new(0).unwrap();
        let reader = PowerTableReader::new(csv.as_bytes(), &rules, Scope::Package, clock()).unwrap();
        let err = integrate_table(reader, None).unwrap_err();
        assert!(matches!(err, PowerTableError::EmptyInput));
    }

    #[test]
    fn test_core_scope_uses_core_columns() {
        let csv = "Elapsed Time (sec),Cumulative Processor Energy_0(Joules),Cumulative IA Energy_0(Joules),IA Power_0(Watt)\n\
                   0,0,0,4\n1,10,4,5\n2,20,9,5\n";
        let (roles, rows) = table(csv, Scope::Core(0));
        let outcome = integrate(&rows, &roles, None).unwrap();

        assert!(close(outcome.total_j, 9.0));
        assert_eq!(outcome.scope, Scope::Core(0));
        assert!(!outcome.scope_degraded);
    }

    #[test]
    fn test_unresolvable_scope_delegates_to_package() {
        let csv = "Elapsed Time (sec),Cumulative Processor Energy_0(Joules)\n0,0\n1,10\n";
        let (roles, rows) = table(csv, Scope::Core(5));
        let outcome = integrate(&rows, &roles, None).unwrap();

        assert!(close(outcome.total_j, 10.0));
        assert_eq!(outcome.scope, Scope::Package);
        assert_eq!(outcome.requested_scope, Scope::Core(5));
        assert!(outcome.scope_degraded);
    }

    #[test]
    fn test_zero_scoped_total_delegates_to_package() {
        let csv = "Elapsed Time (sec),Cumulative Processor Energy(Joules),Core 2 Energy(Joules)\n\
                   0,0,0\n1,10,0\n";
        let (roles, rows) = table(csv, Scope::Core(2));
        let outcome = integrate(&rows, &roles, None).unwrap();

        assert!(close(outcome.total_j, 10.0));
        assert_eq!(outcome.scope, Scope::Package);
    }

    #[test]
    fn test_zero_power_readings_integrate_to_zero() {
        let csv = "System Time,Processor Power_0(Watt)\n12:00:00:000,0\n12:00:10:000,0\n";
        let (roles, rows) = table(csv, Scope::Package);
        let outcome = integrate(&rows, &roles, window("12:00:00:000", "12:00:10:000")).unwrap();

        assert_eq!(outcome.total_j, 0.0);
        assert_eq!(outcome.strategy, Strategy::AlignedOverlap);
    }

    #[test]
    fn test_power_rows_outside_window_integrate_to_zero() {
        let csv = "System Time,Processor Power_0(Watt)\n12:00:00:000,10\n12:00:10:000,10\n";
        let (roles, rows) = table(csv, Scope::Package);
        let outcome = integrate(&rows, &roles, window("13:00:00:000", "13:00:10:000")).unwrap();

        assert_eq!(outcome.total_j, 0.0);
        assert_eq!(outcome.strategy, Strategy::AlignedOverlap);
    }

    #[test]
    fn test_domain_scope_uses_domain_columns() {
        let csv = "Elapsed Time (sec),Cumulative Processor Energy(Joules),Cumulative IA Energy(Joules),IA Power(Watt)\n\
                   0,0,0,3\n1,10,4,4\n2,20,9,5\n";
        let (roles, rows) = table(csv, Scope::Domain);
        let outcome = integrate(&rows, &roles, None).unwrap();

        assert!(close(outcome.total_j, 9.0));
        assert_eq!(outcome.scope, Scope::Domain);
        assert!(!outcome.scope_degraded);
    }

    #[test]
    fn test_domain_scope_on_per_core_header_falls_back_to_package() {
        let csv = "Elapsed Time (sec),Processor Power_0(Watt),Cumulative Processor Energy_0(Joules),\
                   IA Power_0(Watt),Cumulative IA Energy_0(Joules)\n\
                   0,20,0,5,0\n1,20,20,5,5\n2,20,40,5,10\n";
        let (roles, rows) = table(csv, Scope::Domain);
        let outcome = integrate(&rows, &roles, None).unwrap();

        assert!(close(outcome.total_j, 40.0));
        assert_eq!(outcome.scope, Scope::Package);
        assert_eq!(outcome.requested_scope, Scope::Domain);
        assert!(outcome.scope_degraded);
    }

    #[test]
    fn test_streamed_table_tolerates_bad_bytes() {
        let bytes: &[u8] = b"Elapsed Time,Cumulative Processor Energy(Joules),Note\n0,0,a\n1,5,caf\xE9\n2,12,b\n";
        let rules = ColumnRules::new(0).unwrap();
        let reader = PowerTableReader::new(bytes, &rules, Scope::Package, clock()).unwrap();
        let outcome = integrate_table(reader, None).unwrap();

        assert!(close(outcome.total_j, 12.0));
        assert_eq!(outcome.strategy, Strategy::WholeFileCounter);
    }

    #[test]
    fn test_streamed_quoted_table() {
        let csv = "\"Elapsed Time\",\"Cumulative Processor Energy(Joules)\"\n\"0\",\"0\"\n\"1\",\"5\"\n\"2\",\"12\"\n";
        let rules = ColumnRules::new(0).unwrap();
        let reader = PowerTableReader::new(csv.as_bytes(), &rules, Scope::Package, clock()).unwrap();
        let outcome = integrate_table(reader, None).unwrap();

        assert!(close(outcome.total_j, 12.0));
    }
}
