//! Column role discovery for power tables.
//!
//! Exporters disagree on header vocabulary ("Processor Power_0(Watt)",
//! "Cumulative IA Energy_0(Joules)", "System Time", ...), so roles are found
//! by matching normalized header text against an ordered list of rules.
//! Each rule names a role, patterns that must all match, and patterns that
//! must not match. The first column satisfying a rule gets that role.

use super::power_table::table_reader;
use crate::utils::config::{
    ELAPSED_PATTERN, ENERGY_PATTERN, HEADER_MARKER, POWER_PATTERN, WALL_CLOCK_PATTERN,
};
use crate::utils::error::PowerTableError;
use csv::ByteRecord;
use log::{debug, info, warn};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

/// Semantic role of a power table column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnRole {
    /// Cumulative package/processor energy in joules
    Energy,
    /// Instantaneous package/processor power in watts
    Power,
    /// Seconds since the start of the recording
    Elapsed,
    /// Wall-clock "system time"
    WallClock,
    CoreEnergy(u32),
    CorePower(u32),
    /// Integrated-accelerator (IA) domain-wide energy
    DomainEnergy,
    DomainPower,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRole::Energy => write!(f, "energy"),
            ColumnRole::Power => write!(f, "power"),
            ColumnRole::Elapsed => write!(f, "elapsed"),
            ColumnRole::WallClock => write!(f, "wall-clock"),
            ColumnRole::CoreEnergy(core) => write!(f, "core {} energy", core),
            ColumnRole::CorePower(core) => write!(f, "core {} power", core),
            ColumnRole::DomainEnergy => write!(f, "domain energy"),
            ColumnRole::DomainPower => write!(f, "domain power"),
        }
    }
}

/// Granularity of the energy signal requested by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Whole processor package
    #[default]
    Package,
    /// A specific core index
    Core(u32),
    /// Integrated accelerator / domain-wide metrics
    Domain,
}

impl Scope {
    /// Build a scope from CLI options; the domain flag wins over a core index
    pub fn from_options(core: Option<u32>, prefer_domain: bool) -> Self {
        match (core, prefer_domain) {
            (_, true) => Scope::Domain,
            (Some(core), false) => Scope::Core(core),
            (None, false) => Scope::Package,
        }
    }

    /// Core index used for per-core header matching (0 unless a core was requested)
    pub fn core_index(&self) -> u32 {
        match self {
            Scope::Core(core) => *core,
            _ => 0,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Package => write!(f, "package"),
            Scope::Core(core) => write!(f, "core {}", core),
            Scope::Domain => write!(f, "domain (IA)"),
        }
    }
}

/// One declarative header rule
#[derive(Debug, Clone)]
struct ColumnRule {
    role: ColumnRole,
    require: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl ColumnRule {
    fn new(role: ColumnRole, require: Vec<Regex>) -> Self {
        Self {
            role,
            require,
            exclude: Vec::new(),
        }
    }

    fn excluding(mut self, exclude: Vec<Regex>) -> Self {
        self.exclude = exclude;
        self
    }

    fn matches(&self, normalized: &str) -> bool {
        self.require.iter().all(|re| re.is_match(normalized))
            && !self.exclude.iter().any(|re| re.is_match(normalized))
    }
}

/// Ordered header rules for one target core index
///
/// **Public** - built once per run and passed to the parser
#[derive(Debug, Clone)]
pub struct ColumnRules {
    core_index: u32,
    rules: Vec<ColumnRule>,
}

impl ColumnRules {
    /// Build the rule list, with per-core rules bound to `core_index`
    pub fn new(core_index: u32) -> Result<Self, regex::Error> {
        let milliwatt_hours = Regex::new(r"mwh")?;
        let core_energy = Regex::new(&format!(
            r"(?:core|processor|ia\s*core)\s*{core}\s*energy|ia\s*energy\s*{core}\b",
            core = core_index
        ))?;
        let core_power = Regex::new(&format!(
            r"(?:core|processor|ia\s*core)\s*{core}\s*power|ia\s*power\s*{core}\b",
            core = core_index
        ))?;

        let rules = vec![
            ColumnRule::new(ColumnRole::Energy, vec![Regex::new(ENERGY_PATTERN)?]),
            ColumnRule::new(ColumnRole::Power, vec![Regex::new(POWER_PATTERN)?]),
            ColumnRule::new(ColumnRole::Elapsed, vec![Regex::new(ELAPSED_PATTERN)?]),
            ColumnRule::new(ColumnRole::WallClock, vec![Regex::new(WALL_CLOCK_PATTERN)?]),
            ColumnRule::new(ColumnRole::CoreEnergy(core_index), vec![core_energy.clone()])
                .excluding(vec![milliwatt_hours.clone()]),
            ColumnRule::new(ColumnRole::CorePower(core_index), vec![core_power.clone()]),
            ColumnRule::new(
                ColumnRole::DomainEnergy,
                vec![Regex::new(r"\bia\s*energy")?, Regex::new(r"cumulative")?],
            )
            .excluding(vec![milliwatt_hours, core_energy]),
            ColumnRule::new(ColumnRole::DomainPower, vec![Regex::new(r"\bia\s*power")?])
                .excluding(vec![core_power]),
        ];

        Ok(Self { core_index, rules })
    }

    pub fn core_index(&self) -> u32 {
        self.core_index
    }

    /// Roles a single normalized header field satisfies, in rule order
    ///
    /// **Public** - useful for diagnostics and tests
    pub fn roles_for(&self, normalized: &str) -> Vec<ColumnRole> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(normalized))
            .map(|rule| rule.role)
            .collect()
    }
}

/// Normalize a header field for matching
///
/// Strips the leading marker, lowercases, turns underscores into spaces and
/// collapses runs of whitespace.
pub fn normalize_header(field: &str) -> String {
    field
        .replace(HEADER_MARKER, " ")
        .replace('_', " ")
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolved column roles for one power table
///
/// **Public** - computed once from the header, immutable afterwards
#[derive(Debug, Clone)]
pub struct ColumnRoleMap {
    header: String,
    columns: Vec<String>,
    roles: BTreeMap<ColumnRole, usize>,
    scope: Scope,
    scoped_energy: Option<usize>,
    scoped_power: Option<usize>,
    scope_degraded: bool,
}

impl ColumnRoleMap {
    /// Resolve column roles from a header line
    ///
    /// # Errors
    /// * `PowerTableError::Csv` - the line is not a readable CSV record
    /// * `PowerTableError::MissingColumns` - no energy or power column in any scope
    pub fn from_header(
        header_line: &str,
        rules: &ColumnRules,
        scope: Scope,
    ) -> Result<Self, PowerTableError> {
        let mut record = ByteRecord::new();
        table_reader(header_line.as_bytes()).read_byte_record(&mut record)?;
        Self::from_record(&record, rules, scope)
    }

    /// Resolve column roles from an already-read header record
    ///
    /// **Public** - used by the streaming reader
    pub fn from_record(
        record: &ByteRecord,
        rules: &ColumnRules,
        scope: Scope,
    ) -> Result<Self, PowerTableError> {
        let columns: Vec<String> = record
            .iter()
            .map(|field| {
                String::from_utf8_lossy(field)
                    .trim_start_matches(HEADER_MARKER)
                    .trim()
                    .to_string()
            })
            .collect();
        let header = columns.join(",");

        let mut roles = BTreeMap::new();
        for (index, column) in columns.iter().enumerate() {
            let normalized = normalize_header(column);
            for role in rules.roles_for(&normalized) {
                roles.entry(role).or_insert(index);
            }
        }

        let mut map = Self {
            header,
            columns,
            roles,
            scope,
            scoped_energy: None,
            scoped_power: None,
            scope_degraded: false,
        };
        map.resolve_scope();

        if map.energy().is_none()
            && map.power().is_none()
            && map.scoped_energy.is_none()
            && map.scoped_power.is_none()
        {
            return Err(PowerTableError::MissingColumns { header: map.header });
        }

        for (role, index) in &map.roles {
            debug!("Column {} '{}' -> {}", index, map.columns[*index], role);
        }

        Ok(map)
    }

    /// Pick the energy/power columns for the requested scope
    ///
    /// **Private** - internal helper for from_record
    fn resolve_scope(&mut self) {
        match self.scope {
            Scope::Package => {}
            Scope::Core(core) => {
                self.scoped_energy = self.index_of(ColumnRole::CoreEnergy(core));
                self.scoped_power = self.index_of(ColumnRole::CorePower(core));

                if let Some(index) = self.scoped_energy {
                    info!("Found Core {} energy column: {}", core, self.columns[index]);
                }
                if let Some(index) = self.scoped_power {
                    info!("Found Core {} power column: {}", core, self.columns[index]);
                }

                if core == 0 {
                    self.fill_core_from_domain();
                }
            }
            Scope::Domain => {
                self.scoped_energy = self.index_of(ColumnRole::DomainEnergy);
                self.scoped_power = self.index_of(ColumnRole::DomainPower);
                info!("Using IA metrics as requested");
            }
        }
    }

    /// Fill missing core 0 columns from domain-wide ones
    ///
    /// Degraded only when a domain column was actually borrowed.
    fn fill_core_from_domain(&mut self) {
        let energy_fill = match self.scoped_energy {
            None => self.index_of(ColumnRole::DomainEnergy),
            Some(_) => None,
        };
        let power_fill = match self.scoped_power {
            None => self.index_of(ColumnRole::DomainPower),
            Some(_) => None,
        };

        if energy_fill.is_none() && power_fill.is_none() {
            return;
        }

        warn!("No Core 0 specific power/energy columns found, falling back to domain-wide columns");
        self.scoped_energy = self.scoped_energy.or(energy_fill);
        self.scoped_power = self.scoped_power.or(power_fill);
        self.scope_degraded = true;
    }

    /// Column index holding `role`, if any
    pub fn index_of(&self, role: ColumnRole) -> Option<usize> {
        self.roles.get(&role).copied()
    }

    /// All roles resolved to column `index`
    pub fn roles_of(&self, index: usize) -> Vec<ColumnRole> {
        self.roles
            .iter()
            .filter(|(_, i)| **i == index)
            .map(|(role, _)| *role)
            .collect()
    }

    /// Iterate over (role, column index) pairs
    pub fn iter(&self) -> impl Iterator<Item = (ColumnRole, usize)> + '_ {
        self.roles.iter().map(|(role, index)| (*role, *index))
    }

    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Header text with the marker byte stripped
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn energy(&self) -> Option<usize> {
        self.index_of(ColumnRole::Energy)
    }

    pub fn power(&self) -> Option<usize> {
        self.index_of(ColumnRole::Power)
    }

    pub fn elapsed(&self) -> Option<usize> {
        self.index_of(ColumnRole::Elapsed)
    }

    pub fn wall_clock(&self) -> Option<usize> {
        self.index_of(ColumnRole::WallClock)
    }

    /// Energy column selected for a non-package scope
    pub fn scoped_energy(&self) -> Option<usize> {
        self.scoped_energy
    }

    pub fn scoped_power(&self) -> Option<usize> {
        self.scoped_power
    }

    /// True when a core-0 request borrowed domain-wide columns
    pub fn scope_degraded(&self) -> bool {
        self.scope_degraded
    }
}
