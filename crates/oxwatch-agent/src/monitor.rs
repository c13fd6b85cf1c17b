use crate::config::{ConfigDocument, LoadCounts};
use crate::error::{MonitorError, Result};
use indexmap::IndexMap;
use oxwatch_alert::{Incident, Template};
use oxwatch_collector::source::VariableSpec;
use oxwatch_collector::variable::{Variable, VariableKind, DEFAULT_HISTORY_DEPTH};
use oxwatch_common::types::{Context, SeverityOrder};
use oxwatch_notify::ActionExecutor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

fn history_names(name: &str) -> [String; 3] {
    [
        format!("last_{name}"),
        format!("oldest_{name}"),
        format!("history_{name}"),
    ]
}

/// What one evaluation cycle produced.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Every name visible to incidents during the cycle.
    pub context: Context,
    /// Incidents with a level in range, in declaration order.
    pub in_range: Vec<String>,
    /// Escalation commands handed to the executor.
    pub escalations: usize,
}

/// Cooperative stop signal for [`Monitor::run`].
///
/// Stopping takes effect between cycles; a cycle in progress always
/// completes. Calling [`StopHandle::stop`] more than once is harmless.
#[derive(Debug, Clone)]
pub struct StopHandle(CancellationToken);

impl StopHandle {
    pub fn stop(&self) {
        if !self.0.is_cancelled() {
            tracing::info!("Stop requested");
        }
        self.0.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Owns every constant, variable, derivative and incident, and drives the
/// fetch → derive → evaluate cycle.
pub struct Monitor {
    order: SeverityOrder,
    executor: Arc<dyn ActionExecutor>,
    constants: Vec<Variable>,
    variables: Vec<Variable>,
    derivatives: IndexMap<String, Template>,
    incidents: Vec<Incident>,
    /// Constant values every cycle context starts from.
    base: Context,
    base_stale: bool,
    /// Derivative results of the last successful cycle.
    last_derived: Context,
    cancel: CancellationToken,
    cycles: u64,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("order", &self.order)
            .field("executor", &self.executor.name())
            .field("constants", &self.constants.len())
            .field("variables", &self.variables.len())
            .field("derivatives", &self.derivatives.len())
            .field("incidents", &self.incidents.len())
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl Monitor {
    pub fn new(order: SeverityOrder, executor: Arc<dyn ActionExecutor>) -> Self {
        Self {
            order,
            executor,
            constants: Vec::new(),
            variables: Vec::new(),
            derivatives: IndexMap::new(),
            incidents: Vec::new(),
            base: Context::new(),
            base_stale: false,
            last_derived: Context::new(),
            cancel: CancellationToken::new(),
            cycles: 0,
        }
    }

    pub fn order(&self) -> &SeverityOrder {
        &self.order
    }

    pub fn constants(&self) -> &[Variable] {
        &self.constants
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn derivatives(&self) -> &IndexMap<String, Template> {
        &self.derivatives
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn incident(&self, name: &str) -> Option<&Incident> {
        self.incidents.iter().find(|i| i.name() == name)
    }

    /// Number of cycles run so far, failed ones included.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn name_taken(&self, name: &str) -> bool {
        self.constants.iter().any(|v| v.name() == name)
            || self.variables.iter().any(|v| v.name() == name)
            || self.derivatives.contains_key(name)
    }

    /// `(generated, owner)` pairs for every name cycles add to the context
    /// besides the configured ones.
    fn generated_names(&self) -> impl Iterator<Item = (String, &str)> {
        let history = self
            .variables
            .iter()
            .filter(|v| v.depth() > 0)
            .flat_map(|v| history_names(v.name()).into_iter().map(move |g| (g, v.name())));
        let derived = self
            .derivatives
            .keys()
            .map(|name| (format!("last_{name}"), name.as_str()));
        history.chain(derived)
    }

    /// Rejects `name` when it is already configured or generated, and when
    /// one of the names it would generate is already configured.
    fn check_name(&self, name: &str, generates: &[String]) -> Result<()> {
        if self.name_taken(name) {
            return Err(MonitorError::DuplicateName(name.to_string()));
        }
        if let Some((_, owner)) = self.generated_names().find(|(g, _)| g == name) {
            return Err(MonitorError::ReservedName {
                name: name.to_string(),
                owner: owner.to_string(),
            });
        }
        if let Some(generated) = generates.iter().find(|g| self.name_taken(g)) {
            return Err(MonitorError::ReservedName {
                name: generated.clone(),
                owner: name.to_string(),
            });
        }
        Ok(())
    }

    /// Registers an already built variable; its kind decides whether it is
    /// a constant or refreshed every cycle.
    pub fn add_variable(&mut self, variable: Variable) -> Result<()> {
        let generates = match variable.kind() {
            VariableKind::Measured if variable.depth() > 0 => history_names(variable.name()).to_vec(),
            _ => Vec::new(),
        };
        self.check_name(variable.name(), &generates)?;
        match variable.kind() {
            VariableKind::Constant => {
                tracing::info!(name = variable.name(), value = %variable.current(), "Constant configured");
                self.constants.push(variable);
                self.base_stale = true;
            }
            VariableKind::Measured => {
                tracing::info!(name = variable.name(), "Variable configured");
                self.variables.push(variable);
            }
        }
        Ok(())
    }

    fn add_specs(
        &mut self,
        specs: &IndexMap<String, VariableSpec>,
        kind: VariableKind,
    ) -> Result<usize> {
        for (name, spec) in specs {
            let keeps_history = spec.history.unwrap_or(DEFAULT_HISTORY_DEPTH) > 0;
            let generates = match kind {
                VariableKind::Measured if keeps_history => history_names(name).to_vec(),
                _ => Vec::new(),
            };
            // checked before building so a rejected name is never fetched
            self.check_name(name, &generates)?;
            let variable = Variable::from_spec(name, kind, spec).map_err(|source| {
                MonitorError::Variable {
                    name: name.clone(),
                    source,
                }
            })?;
            self.add_variable(variable)?;
        }
        Ok(specs.len())
    }

    pub fn add_constants(&mut self, specs: &IndexMap<String, VariableSpec>) -> Result<usize> {
        self.add_specs(specs, VariableKind::Constant)
    }

    pub fn add_variables(&mut self, specs: &IndexMap<String, VariableSpec>) -> Result<usize> {
        self.add_specs(specs, VariableKind::Measured)
    }

    /// Adds derivatives; they resolve in the order given, after all
    /// previously added ones.
    pub fn add_derivatives(&mut self, specs: &IndexMap<String, String>) -> Result<usize> {
        for (name, expr) in specs {
            self.check_name(name, &[format!("last_{name}")])?;
            self.derivatives
                .insert(name.clone(), Template::new(expr.as_str()));
            tracing::info!(name = %name, expr = %expr, "Derivative configured");
        }
        Ok(specs.len())
    }

    pub fn add_incidents(&mut self, specs: &IndexMap<String, serde_json::Value>) -> Result<usize> {
        for (name, spec) in specs {
            if self.incident(name).is_some() {
                return Err(MonitorError::DuplicateIncident(name.clone()));
            }
            let incident = Incident::new(name, spec, &self.order)?;
            tracing::info!(
                name = %name,
                levels = incident.levels().len(),
                "Incident configured"
            );
            self.incidents.push(incident);
        }
        Ok(specs.len())
    }

    /// Adds every section of `document`, constants first. The first item
    /// that fails aborts the load.
    pub fn load_document(&mut self, document: &ConfigDocument) -> Result<LoadCounts> {
        Ok(LoadCounts {
            constants: self.add_constants(&document.constants)?,
            variables: self.add_variables(&document.variables)?,
            derivatives: self.add_derivatives(&document.derivatives)?,
            incidents: self.add_incidents(&document.incidents)?,
        })
    }

    /// Rebuilds the base context from the constants.
    pub fn fetch_constants(&mut self) {
        self.base.clear();
        for constant in &self.constants {
            self.base
                .insert(constant.name().to_string(), constant.current().clone());
            tracing::debug!(name = constant.name(), value = %constant.current(), "Constant loaded");
        }
        self.base_stale = false;
    }

    /// Refreshes the variables and resolves the derivatives into a fresh
    /// context seeded from the constants.
    fn refresh_and_derive(&mut self) -> Result<Context> {
        if self.base_stale {
            self.fetch_constants();
        }
        let mut context = self.base.clone();

        for variable in &mut self.variables {
            if let Err(source) = variable.refresh() {
                return Err(MonitorError::Source {
                    name: variable.name().to_string(),
                    source,
                });
            }
            variable.publish(&mut context);
            tracing::debug!(name = variable.name(), value = %variable.current(), "Variable refreshed");
        }

        for (name, template) in &self.derivatives {
            if let Some(last) = self.last_derived.get(name) {
                context.insert(format!("last_{name}"), last.clone());
            }
            let value = template
                .resolve(&context)
                .map_err(|source| MonitorError::Expression {
                    name: name.clone(),
                    source,
                })?;
            tracing::debug!(name = %name, expr = %template, value = %value, "Derivative resolved");
            context.insert(name.clone(), value);
        }

        Ok(context)
    }

    /// Runs one fetch → derive → evaluate cycle.
    ///
    /// Any source or expression error stops the cycle where it happened and
    /// is returned; incidents evaluated before the failure keep their new
    /// state and their escalations have already been executed.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycles += 1;
        let context = self.refresh_and_derive()?;

        for name in self.derivatives.keys() {
            if let Some(value) = context.get(name) {
                self.last_derived.insert(name.clone(), value.clone());
            }
        }

        let mut report = CycleReport::default();
        for incident in &mut self.incidents {
            let outcome = incident
                .escalated(&context)
                .map_err(|source| MonitorError::Expression {
                    name: incident.name().to_string(),
                    source,
                })?;

            if outcome.in_range {
                report.in_range.push(incident.name().to_string());
            }
            for escalation in outcome.escalations {
                report.escalations += 1;
                if let Err(e) = self.executor.execute(&escalation.command) {
                    tracing::warn!(
                        incident = incident.name(),
                        level = %escalation.severity,
                        executor = self.executor.name(),
                        error = %e,
                        "Escalation failed"
                    );
                }
            }
        }

        tracing::debug!(
            cycle = self.cycles,
            in_range = report.in_range.len(),
            escalations = report.escalations,
            "Cycle complete"
        );
        report.context = context;
        Ok(report)
    }

    /// Fetches and derives like [`Monitor::run_cycle`], then checks every
    /// incident template without changing incident state or executing
    /// anything.
    pub fn verify(&mut self) -> Result<Context> {
        let context = self.refresh_and_derive()?;
        for (name, value) in &context {
            tracing::debug!(name = %name, value = %value, "Resolved");
        }
        for incident in &self.incidents {
            incident
                .verify(&context)
                .map_err(|source| MonitorError::Expression {
                    name: incident.name().to_string(),
                    source,
                })?;
            tracing::debug!(incident = incident.name(), "Incident verified");
        }
        Ok(context)
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.cancel.clone())
    }

    /// Runs one cycle on a blocking worker that owns the monitor until the
    /// cycle is done.
    async fn cycle_on_worker(mut self) -> Result<(Monitor, Result<CycleReport>)> {
        tokio::task::spawn_blocking(move || {
            let report = self.run_cycle();
            (self, report)
        })
        .await
        .map_err(|e| MonitorError::Worker(e.to_string()))
    }

    /// Runs the monitor and gives it back once it stops.
    ///
    /// A non-positive (or non-finite) `interval_secs` runs exactly one cycle
    /// and returns its error, if any. Otherwise a cycle runs immediately and
    /// then once per interval until [`StopHandle::stop`] is called; a failed
    /// cycle is logged and the next tick proceeds normally. The stop signal
    /// is only checked between cycles, so the first cycle always runs. Cycles
    /// never overlap: the next tick is only awaited once the current cycle is
    /// done.
    pub async fn run(self, interval_secs: f64) -> Result<Monitor> {
        if !(interval_secs.is_finite() && interval_secs > 0.0) {
            tracing::debug!("Running a single cycle");
            let (monitor, report) = self.cycle_on_worker().await?;
            report?;
            return Ok(monitor);
        }

        let invalid = || MonitorError::InvalidInterval(interval_secs);
        let period = Duration::try_from_secs_f64(interval_secs).map_err(|_| invalid())?;
        let first_tick = Instant::now().checked_add(period).ok_or_else(invalid)?;
        let stop = self.cancel.clone();

        tracing::info!(interval_secs, "Monitoring started");
        let mut monitor = self;
        let mut ticker = tokio::time::interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let (returned, report) = monitor.cycle_on_worker().await?;
            monitor = returned;
            if let Err(e) = report {
                tracing::error!(cycle = monitor.cycles, error = %e, "Cycle failed, skipping");
            }

            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }
        }

        tracing::info!(cycles = monitor.cycles, "Monitoring stopped");
        Ok(monitor)
    }
}
