use crate::error::{Result, SourceError};
use crate::ValueSource;
use oxwatch_common::types::Value;
use std::path::{Path, PathBuf};
use sysinfo::System;

const PROC_SYS_ROOT: &str = "/proc/sys";

#[derive(Debug, Clone, PartialEq)]
enum Counter {
    Ncpu,
    CpuUsage,
    OsType,
    OsRelease,
    Hostname,
    BootTime,
    Uptime,
    LoadAvg,
    MemTotal,
    MemUsed,
    MemAvailable,
    MemFree,
    SwapTotal,
    SwapUsed,
    /// A kernel tunable exposed as a file, e.g. `/proc/sys/net/core/somaxconn`.
    File(PathBuf),
}

impl Counter {
    fn well_known(name: &str) -> Option<Self> {
        let counter = match name {
            "hw.ncpu" => Self::Ncpu,
            "hw.cpu.usage" => Self::CpuUsage,
            "hw.physmem" | "vm.mem.total" => Self::MemTotal,
            "kern.ostype" => Self::OsType,
            "kern.osrelease" => Self::OsRelease,
            "kern.hostname" => Self::Hostname,
            "kern.boottime" => Self::BootTime,
            "kern.uptime" => Self::Uptime,
            "vm.loadavg" => Self::LoadAvg,
            "vm.mem.used" => Self::MemUsed,
            "vm.mem.available" => Self::MemAvailable,
            "vm.mem.free" => Self::MemFree,
            "vm.swap.total" => Self::SwapTotal,
            "vm.swap.used" => Self::SwapUsed,
            _ => return None,
        };
        Some(counter)
    }
}

/// Reads a kernel counter addressed by a hierarchical dotted name.
///
/// Well known names (`hw.ncpu`, `vm.loadavg`, `kern.ostype`, ...) are served
/// through `sysinfo`; any other name is looked up as a file below the
/// kernel tunables root, one path segment per name component.
pub struct CounterSource {
    name: String,
    counter: Counter,
    system: System,
}

impl CounterSource {
    pub fn new(name: &str) -> Result<Self> {
        Self::with_root(name, Path::new(PROC_SYS_ROOT))
    }

    /// Like [`CounterSource::new`] but resolves file counters below `root`.
    pub fn with_root(name: &str, root: &Path) -> Result<Self> {
        let counter = match Counter::well_known(name) {
            Some(counter) => counter,
            None => Counter::File(
                counter_path(root, name).ok_or_else(|| SourceError::UnknownCounter(name.to_string()))?,
            ),
        };
        Ok(Self {
            name: name.to_string(),
            counter,
            system: System::new(),
        })
    }
}

fn counter_path(root: &Path, name: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in name.split('.') {
        if segment.is_empty() || segment.contains('/') || segment == ".." {
            return None;
        }
        path.push(segment);
    }
    path.is_file().then_some(path)
}

fn uint(v: u64) -> Value {
    Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
}

/// Decodes the text of a kernel tunable: an integer, a float, a whitespace
/// separated integer vector, or plain text.
pub fn parse_counter_text(text: &str) -> Value {
    let text = text.trim();
    if let Ok(i) = text.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        return Value::Float(f);
    }
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() > 1 {
        if let Ok(ints) = fields.iter().map(|f| f.parse::<i64>()).collect::<std::result::Result<Vec<_>, _>>() {
            return Value::List(ints.into_iter().map(Value::Int).collect());
        }
    }
    Value::Str(text.to_string())
}

impl ValueSource for CounterSource {
    fn kind(&self) -> &str {
        "sysctl"
    }

    fn identifier(&self) -> &str {
        &self.name
    }

    fn fetch(&mut self) -> Result<Value> {
        let value = match &self.counter {
            Counter::Ncpu => {
                self.system.refresh_cpu_all();
                Value::Int(self.system.cpus().len() as i64)
            }
            Counter::CpuUsage => {
                self.system.refresh_cpu_all();
                Value::Float(self.system.global_cpu_usage() as f64)
            }
            Counter::OsType => Value::Str(System::name().unwrap_or_default()),
            Counter::OsRelease => Value::Str(System::kernel_version().unwrap_or_default()),
            Counter::Hostname => Value::Str(System::host_name().unwrap_or_default()),
            Counter::BootTime => uint(System::boot_time()),
            Counter::Uptime => uint(System::uptime()),
            Counter::LoadAvg => {
                let load = System::load_average();
                Value::List(vec![
                    Value::Float(load.one),
                    Value::Float(load.five),
                    Value::Float(load.fifteen),
                ])
            }
            Counter::MemTotal => {
                self.system.refresh_memory();
                uint(self.system.total_memory())
            }
            Counter::MemUsed => {
                self.system.refresh_memory();
                uint(self.system.used_memory())
            }
            Counter::MemAvailable => {
                self.system.refresh_memory();
                uint(self.system.available_memory())
            }
            Counter::MemFree => {
                self.system.refresh_memory();
                uint(self.system.free_memory())
            }
            Counter::SwapTotal => {
                self.system.refresh_memory();
                uint(self.system.total_swap())
            }
            Counter::SwapUsed => {
                self.system.refresh_memory();
                uint(self.system.used_swap())
            }
            Counter::File(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| SourceError::Counter {
                    name: self.name.clone(),
                    reason: e.to_string(),
                })?;
                parse_counter_text(&text)
            }
        };
        Ok(value)
    }
}
