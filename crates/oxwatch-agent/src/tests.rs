use crate::config::{ConfigDocument, LoadCounts};
use crate::error::MonitorError;
use crate::logging::{check_date_format, LogTarget};
use crate::monitor::Monitor;
use oxwatch_collector::error::{Result as SourceResult, SourceError};
use oxwatch_collector::variable::{Variable, VariableKind};
use oxwatch_collector::ValueSource;
use oxwatch_common::types::{SeverityOrder, Value};
use oxwatch_notify::{ActionExecutor, RecordingExecutor};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Yields `values` in order (repeating the last one) and fails on the
/// fetch numbered `fail_at`, counting the initial fetch as 0.
struct Scripted {
    values: Vec<Value>,
    calls: Arc<AtomicUsize>,
    fail_at: Option<usize>,
}

impl Scripted {
    fn new(values: Vec<Value>, calls: Arc<AtomicUsize>) -> Self {
        Self {
            values,
            calls,
            fail_at: None,
        }
    }

    fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }
}

impl ValueSource for Scripted {
    fn kind(&self) -> &str {
        "scripted"
    }

    fn identifier(&self) -> &str {
        "script"
    }

    fn fetch(&mut self) -> SourceResult<Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(call) {
            return Err(SourceError::Counter {
                name: "script".into(),
                reason: "gone".into(),
            });
        }
        Ok(self.values[call.min(self.values.len() - 1)].clone())
    }
}

/// Sleeps on every fetch and flags any fetch that starts while another
/// one is still running.
struct Slow {
    busy: Arc<AtomicBool>,
    overlapped: Arc<AtomicBool>,
}

impl ValueSource for Slow {
    fn kind(&self) -> &str {
        "slow"
    }

    fn identifier(&self) -> &str {
        "slow"
    }

    fn fetch(&mut self) -> SourceResult<Value> {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        std::thread::sleep(Duration::from_millis(40));
        self.busy.store(false, Ordering::SeqCst);
        Ok(Value::Int(1))
    }
}

struct Failing;

impl ActionExecutor for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn execute(&self, _command: &str) -> anyhow::Result<()> {
        anyhow::bail!("no shell today")
    }
}

fn new_monitor() -> (Monitor, Arc<RecordingExecutor>) {
    let recorder = Arc::new(RecordingExecutor::new());
    (Monitor::new(SeverityOrder::default(), recorder.clone()), recorder)
}

fn document(value: serde_json::Value) -> ConfigDocument {
    serde_json::from_value(value).unwrap()
}

fn cpu_check(escalation: &str) -> serde_json::Value {
    json!({
        "description": "number of CPUs",
        "info": {
            "trigger": "{ncpu} <= 4",
            "untrigger": "{ncpu} > 5",
            "escalation": escalation,
        },
    })
}

fn cpu_document(escalation: &str) -> ConfigDocument {
    document(json!({
        "constants": {"ncpu": {"type": "value", "value": 4}},
        "derivatives": {"expr": "1 + 1"},
        "incidents": {"check": cpu_check(escalation)},
    }))
}

fn scripted(name: &str, values: Vec<Value>) -> (Variable, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let source = Scripted::new(values, calls.clone());
    let variable = Variable::new(name, VariableKind::Measured, Box::new(source), 1).unwrap();
    (variable, calls)
}

// ---- configuration ----

#[test]
fn empty_document_loads_nothing() {
    let (mut monitor, _) = new_monitor();
    let doc = ConfigDocument::from_json_str("{}").unwrap();
    assert!(doc.is_empty());
    assert_eq!(monitor.load_document(&doc).unwrap(), LoadCounts::default());
}

#[test]
fn document_counts_every_section() {
    let (mut monitor, _) = new_monitor();
    let counts = monitor.load_document(&cpu_document("echo hi")).unwrap();
    assert_eq!(
        counts,
        LoadCounts {
            constants: 1,
            variables: 0,
            derivatives: 1,
            incidents: 1
        }
    );
    assert_eq!(monitor.constants()[0].current(), &Value::Int(4));
    assert!(monitor.incident("check").is_some());
}

#[test]
fn documents_load_from_json_and_toml_files() {
    let dir = tempfile::tempdir().unwrap();
    let toml_path = dir.path().join("monitor.toml");
    std::fs::write(
        &toml_path,
        r#"
[constants.ncpu]
value = 4

[derivatives]
double = "{ncpu} * 2"
half = "{double} / 4"

[incidents.check]
description = "number of CPUs"

[incidents.check.info]
trigger = "{ncpu} <= 4"
untrigger = "{ncpu} > 5"
escalation = "echo '{description} is {ncpu}'"
"#,
    )
    .unwrap();
    let json_path = dir.path().join("monitor.conf");
    std::fs::write(
        &json_path,
        r#"{"variables": {"uptime": {"syscmd": "echo 12", "history": 3}}}"#,
    )
    .unwrap();

    let from_toml = ConfigDocument::load(&toml_path).unwrap();
    let names: Vec<_> = from_toml.derivatives.keys().cloned().collect();
    assert_eq!(names, ["double", "half"]);

    let from_json = ConfigDocument::load(&json_path).unwrap();
    assert_eq!(from_json.variables["uptime"].history, Some(3));

    let (mut monitor, _) = new_monitor();
    monitor.load_document(&from_toml).unwrap();
    monitor.load_document(&from_json).unwrap();
    let report = monitor.run_cycle().unwrap();
    assert_eq!(report.context["half"], Value::Float(2.0));
    assert_eq!(report.context["uptime"], Value::from("12"));
}

#[test]
fn unreadable_or_invalid_documents_name_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    let err = ConfigDocument::load(&missing).unwrap_err();
    assert!(format!("{err:#}").contains("missing.json"));

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{\"constants\": ").unwrap();
    let err = ConfigDocument::load(&broken).unwrap_err();
    assert!(format!("{err:#}").contains("broken.json"));
}

#[test]
fn names_are_unique_across_constants_variables_and_derivatives() {
    let (mut monitor, _) = new_monitor();
    monitor.load_document(&cpu_document("echo hi")).unwrap();

    let as_variable = document(json!({"variables": {"ncpu": {"value": 8}}}));
    assert!(matches!(
        monitor.load_document(&as_variable),
        Err(MonitorError::DuplicateName(name)) if name == "ncpu"
    ));

    let as_constant = document(json!({"constants": {"expr": {"value": 1}}}));
    assert!(matches!(
        monitor.load_document(&as_constant),
        Err(MonitorError::DuplicateName(name)) if name == "expr"
    ));

    let (variable, _) = scripted("expr", vec![Value::Int(1)]);
    assert!(matches!(
        monitor.add_variable(variable),
        Err(MonitorError::DuplicateName(_))
    ));

    let again = document(json!({"derivatives": {"ncpu": "1"}}));
    assert!(matches!(
        monitor.load_document(&again),
        Err(MonitorError::DuplicateName(_))
    ));
}

#[test]
fn generated_history_names_are_reserved() {
    let (mut monitor, _) = new_monitor();
    let (load, _) = scripted("load", vec![Value::Int(1)]);
    monitor.add_variable(load).unwrap();
    monitor
        .load_document(&document(json!({"derivatives": {"d": "1"}})))
        .unwrap();

    for clash in ["last_load", "oldest_load", "history_load"] {
        let mut spec = json!({"constants": {}});
        spec["constants"][clash] = json!({"value": 1});
        match monitor.load_document(&document(spec)).unwrap_err() {
            MonitorError::ReservedName { name, owner } => {
                assert_eq!(name, clash);
                assert_eq!(owner, "load");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    let doc = document(json!({"derivatives": {"last_d": "2"}}));
    assert!(matches!(
        monitor.load_document(&doc),
        Err(MonitorError::ReservedName { owner, .. }) if owner == "d"
    ));

    // a derivative over a name without history is fine
    let doc = document(json!({"derivatives": {"oldest_d": "2"}}));
    assert_eq!(monitor.load_document(&doc).unwrap().derivatives, 1);
}

#[test]
fn new_names_may_not_generate_configured_ones() {
    let (mut monitor, _) = new_monitor();
    monitor
        .load_document(&document(json!({"constants": {"last_load": {"value": 1}}})))
        .unwrap();

    let (load, calls) = scripted("load", vec![Value::Int(1)]);
    assert!(matches!(
        monitor.add_variable(load),
        Err(MonitorError::ReservedName { name, owner }) if name == "last_load" && owner == "load"
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let doc = document(json!({"variables": {"load": {"syscmd": "echo 1"}}}));
    assert!(matches!(
        monitor.load_document(&doc),
        Err(MonitorError::ReservedName { .. })
    ));
    assert!(monitor.variables().is_empty());

    // without history nothing is generated
    let doc = document(json!({"variables": {"load": {"syscmd": "echo 1", "history": 0}}}));
    assert_eq!(monitor.load_document(&doc).unwrap().variables, 1);
}

#[test]
fn incident_names_are_unique() {
    let (mut monitor, _) = new_monitor();
    monitor.load_document(&cpu_document("echo hi")).unwrap();
    let again = document(json!({"incidents": {"check": cpu_check("echo again")}}));
    assert!(matches!(
        monitor.load_document(&again),
        Err(MonitorError::DuplicateIncident(name)) if name == "check"
    ));
}

#[test]
fn bad_specs_fail_the_load() {
    let (mut monitor, _) = new_monitor();
    let unknown_type = document(json!({"variables": {"x": {"type": "magic", "magic": 1}}}));
    assert!(matches!(
        monitor.load_document(&unknown_type),
        Err(MonitorError::Variable { name, .. }) if name == "x"
    ));

    let no_levels = document(json!({"incidents": {"quiet": {"description": "nothing"}}}));
    assert!(matches!(
        monitor.load_document(&no_levels),
        Err(MonitorError::Incident(_))
    ));
}

// ---- cycles ----

#[test]
fn cycle_escalates_once_per_transition() {
    let (mut monitor, recorder) = new_monitor();
    monitor
        .load_document(&cpu_document("echo '{description} is {ncpu}'"))
        .unwrap();

    let report = monitor.run_cycle().unwrap();
    assert_eq!(report.context["expr"], Value::Int(2));
    assert_eq!(report.context["ncpu"], Value::Int(4));
    assert_eq!(report.in_range, ["check"]);
    assert_eq!(report.escalations, 1);
    assert_eq!(recorder.commands(), ["echo 'number of CPUs is 4'"]);

    let report = monitor.run_cycle().unwrap();
    assert_eq!(report.in_range, ["check"]);
    assert_eq!(report.escalations, 0);
    assert_eq!(recorder.commands().len(), 1);
    assert_eq!(monitor.incident("check").unwrap().triggered(), Some("info"));
}

#[test]
fn variables_and_derivatives_expose_their_history() {
    let (mut monitor, _) = new_monitor();
    let (variable, _) = scripted("x", vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
    monitor.add_variable(variable).unwrap();
    monitor
        .load_document(&document(json!({
            "derivatives": {"d": "{x} * 10", "e": "{d} + 1"}
        })))
        .unwrap();

    let first = monitor.run_cycle().unwrap().context;
    assert_eq!(first["x"], Value::Int(20));
    assert_eq!(first["last_x"], Value::Int(10));
    assert_eq!(first["d"], Value::Int(200));
    assert_eq!(first["e"], Value::Int(201));
    assert!(!first.contains_key("last_d"));

    let second = monitor.run_cycle().unwrap().context;
    assert_eq!(second["x"], Value::Int(30));
    assert_eq!(second["last_x"], Value::Int(20));
    assert_eq!(second["last_d"], Value::Int(200));
    assert_eq!(second["d"], Value::Int(300));
}

#[test]
fn source_failure_skips_the_rest_of_the_cycle() {
    let (mut monitor, recorder) = new_monitor();
    let calls = Arc::new(AtomicUsize::new(0));
    let source = Scripted::new(vec![Value::Int(4)], calls.clone()).failing_at(2);
    let ncpu = Variable::new("ncpu", VariableKind::Measured, Box::new(source), 1).unwrap();
    monitor.add_variable(ncpu).unwrap();
    monitor
        .load_document(&document(json!({"incidents": {"check": cpu_check("echo hi")}})))
        .unwrap();

    assert_eq!(monitor.run_cycle().unwrap().escalations, 1);

    match monitor.run_cycle().unwrap_err() {
        MonitorError::Source { name, .. } => assert_eq!(name, "ncpu"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(monitor.variables()[0].current(), &Value::Int(4));

    // the next cycle runs normally and the incident kept its state
    let report = monitor.run_cycle().unwrap();
    assert_eq!(report.in_range, ["check"]);
    assert_eq!(report.escalations, 0);
    assert_eq!(recorder.commands().len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn derivative_failure_reports_its_name_and_kind() {
    let (mut monitor, _) = new_monitor();
    monitor
        .load_document(&document(json!({"derivatives": {"broken": "{nowhere} + 1"}})))
        .unwrap();
    let err = monitor.run_cycle().unwrap_err();
    assert!(matches!(&err, MonitorError::Expression { name, .. } if name == "broken"));
    assert!(err.expr_error().unwrap().is_unresolved_name());
}

#[test]
fn executor_failures_do_not_fail_the_cycle() {
    let mut monitor = Monitor::new(SeverityOrder::default(), Arc::new(Failing));
    monitor
        .load_document(&cpu_document("echo '{description} is {ncpu}'"))
        .unwrap();
    let report = monitor.run_cycle().unwrap();
    assert_eq!(report.escalations, 1);
    assert_eq!(monitor.incident("check").unwrap().triggered(), Some("info"));
}

#[test]
fn custom_severity_order_is_used_for_incidents() {
    let order = SeverityOrder::new(vec!["critical".into(), "notice".into()]).unwrap();
    let recorder = Arc::new(RecordingExecutor::new());
    let mut monitor = Monitor::new(order, recorder.clone());
    monitor
        .load_document(&document(json!({
            "constants": {"ncpu": {"value": 4}},
            "incidents": {"check": {
                "description": "cpus",
                "critical": {"trigger": "{ncpu} > 64", "untrigger": "{ncpu} < 64", "escalation": "echo critical"},
                "notice": {"trigger": "{ncpu} > 2"},
                "info": {"trigger": "true", "untrigger": "false", "escalation": "echo ignored"},
            }},
        })))
        .unwrap();
    monitor.run_cycle().unwrap();
    assert_eq!(recorder.commands(), ["echo critical"]);
    assert_eq!(monitor.incident("check").unwrap().triggered(), Some("notice"));
}

// ---- verify ----

#[test]
fn verify_resolves_everything_without_escalating() {
    let (mut monitor, recorder) = new_monitor();
    monitor
        .load_document(&cpu_document("echo '{description} is {ncpu}'"))
        .unwrap();
    let context = monitor.verify().unwrap();
    assert_eq!(context["expr"], Value::Int(2));
    assert!(recorder.commands().is_empty());
    assert_eq!(monitor.incident("check").unwrap().triggered(), None);
}

#[test]
fn verify_tells_syntax_errors_from_unknown_names() {
    let (mut monitor, _) = new_monitor();
    monitor
        .load_document(&cpu_document("echo '{description} is {ncpu'"))
        .unwrap();
    let err = monitor.verify().unwrap_err();
    assert!(err.expr_error().unwrap().is_malformed());

    let (mut monitor, _) = new_monitor();
    monitor
        .load_document(&cpu_document("echo '{description} is {cpus}'"))
        .unwrap();
    let err = monitor.verify().unwrap_err();
    assert!(matches!(&err, MonitorError::Expression { name, .. } if name == "check"));
    assert!(err.expr_error().unwrap().is_unresolved_name());
}

// ---- scheduling ----

#[tokio::test]
async fn non_positive_interval_runs_a_single_cycle() {
    for interval in [0.0, -1.0, f64::NAN] {
        let (mut monitor, recorder) = new_monitor();
        monitor
            .load_document(&cpu_document("echo '{description} is {ncpu}'"))
            .unwrap();
        let monitor = monitor.run(interval).await.unwrap();
        assert_eq!(monitor.cycles(), 1);
        assert_eq!(recorder.commands().len(), 1);
    }
}

#[tokio::test]
async fn single_cycle_returns_its_error() {
    let (mut monitor, _) = new_monitor();
    monitor
        .load_document(&document(json!({"derivatives": {"bad": "1 +"}})))
        .unwrap();
    let err = monitor.run(-1.0).await.unwrap_err();
    assert!(err.expr_error().unwrap().is_malformed());
}

#[tokio::test]
async fn periodic_run_stops_on_request() {
    let (mut monitor, _) = new_monitor();
    let (variable, calls) = scripted("x", vec![Value::Int(1)]);
    monitor.add_variable(variable).unwrap();

    let stop = monitor.stop_handle();
    let task = tokio::spawn(monitor.run(0.02));
    tokio::time::sleep(Duration::from_millis(200)).await;
    stop.stop();
    stop.stop();
    assert!(stop.is_stopped());

    let monitor = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(monitor.cycles() >= 2);
    assert_eq!(calls.load(Ordering::SeqCst) as u64, monitor.cycles() + 1);
}

#[tokio::test]
async fn periodic_run_survives_failing_cycles() {
    let (mut monitor, _) = new_monitor();
    monitor
        .load_document(&document(json!({"derivatives": {"bad": "1 / 0"}})))
        .unwrap();
    let stop = monitor.stop_handle();
    let task = tokio::spawn(monitor.run(0.01));
    tokio::time::sleep(Duration::from_millis(100)).await;
    stop.stop();
    let monitor = task.await.unwrap().unwrap();
    assert!(monitor.cycles() >= 2);
}

#[tokio::test]
async fn stop_before_run_still_runs_the_first_cycle() {
    let (mut monitor, recorder) = new_monitor();
    monitor
        .load_document(&cpu_document("echo '{description} is {ncpu}'"))
        .unwrap();
    monitor.stop_handle().stop();
    let monitor = tokio::time::timeout(Duration::from_secs(5), monitor.run(3600.0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(monitor.cycles(), 1);
    assert_eq!(recorder.commands().len(), 1);
}

#[tokio::test]
async fn huge_interval_is_rejected() {
    let (monitor, _) = new_monitor();
    let err = monitor.run(1e300).await.unwrap_err();
    assert!(matches!(err, MonitorError::InvalidInterval(_)));
}

#[tokio::test]
async fn cycles_never_overlap() {
    let (mut monitor, _) = new_monitor();
    let busy = Arc::new(AtomicBool::new(false));
    let overlapped = Arc::new(AtomicBool::new(false));
    let source = Slow {
        busy: busy.clone(),
        overlapped: overlapped.clone(),
    };
    let variable = Variable::new("slow", VariableKind::Measured, Box::new(source), 0).unwrap();
    monitor.add_variable(variable).unwrap();

    let stop = monitor.stop_handle();
    // the tick is shorter than one fetch
    let task = tokio::spawn(monitor.run(0.005));
    tokio::time::sleep(Duration::from_millis(300)).await;
    stop.stop();
    let monitor = task.await.unwrap().unwrap();

    assert!(monitor.cycles() >= 2);
    assert!(!overlapped.load(Ordering::SeqCst));
}

// ---- logging ----

#[test]
fn log_levels_follow_the_target() {
    assert_eq!(LogTarget::Verify.level(), "debug");
    assert_eq!(LogTarget::Quiet.level(), "warn");
    let file = |debug| LogTarget::File {
        path: PathBuf::from("/tmp/oxwatch.log"),
        debug,
        date_format: crate::logging::DEFAULT_DATE_FORMAT.to_string(),
    };
    assert_eq!(file(false).level(), "info");
    assert_eq!(file(true).level(), "debug");
}

#[test]
fn log_date_formats_are_checked() {
    assert!(check_date_format(crate::logging::DEFAULT_DATE_FORMAT).is_ok());
    assert!(check_date_format("%H:%M:%S%.3f").is_ok());
    let err = check_date_format("%Y-%Q").unwrap_err();
    assert!(err.to_string().contains("%Y-%Q"));
}
