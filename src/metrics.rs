use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
};
use std::time::{Duration, Instant};

use crate::flags::FlagRegister;
use crate::registers::RegisterSnapshot;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Counter for instructions executed by opcode
    pub static ref CPU_INSTRUCTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("cpu_instructions_total", "Total number of instructions executed by opcode"),
        &["opcode", "instruction"]
    ).expect("Failed to create CPU instructions counter");

    /// Counter for fetch/decode/execute cycles completed
    pub static ref CPU_STEPS_TOTAL: Counter = Counter::new(
        "cpu_steps_total", "Total number of fetch/decode/execute cycles completed"
    ).expect("Failed to create CPU steps counter");

    /// Histogram for instruction execution time
    pub static ref INSTRUCTION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("instruction_duration_seconds", "Time spent executing instructions")
            .buckets(vec![0.000001, 0.000005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001]),
        &["instruction"]
    ).expect("Failed to create instruction duration histogram");

    /// Counter for faults that stopped an instruction
    pub static ref CPU_FAULTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("cpu_faults_total", "Total number of faults raised by kind"),
        &["kind"]
    ).expect("Failed to create CPU faults counter");

    /// Counter for API requests by endpoint and method
    pub static ref API_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("api_requests_total", "Total number of API requests"),
        &["method", "endpoint", "status"]
    ).expect("Failed to create API requests counter");

    /// Histogram for API request duration
    pub static ref API_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("api_request_duration_seconds", "API request duration")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["method", "endpoint"]
    ).expect("Failed to create API request duration histogram");

    /// Gauge for hosted machine instances
    pub static ref ACTIVE_MACHINES: Gauge = Gauge::new(
        "active_machines_total", "Number of active machine instances"
    ).expect("Failed to create active machines gauge");

    /// Gauge for register values by machine ID
    pub static ref CPU_REGISTER_VALUES: GaugeVec = GaugeVec::new(
        Opts::new("cpu_register_value", "Current register values"),
        &["machine_id", "register"]
    ).expect("Failed to create CPU register values gauge");

    /// Gauge for flags by machine ID
    pub static ref CPU_FLAGS: GaugeVec = GaugeVec::new(
        Opts::new("cpu_flags", "Current flag states (0 or 1)"),
        &["machine_id", "flag"]
    ).expect("Failed to create CPU flags gauge");

    /// Counter for machine resets
    pub static ref MACHINE_RESETS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("machine_resets_total", "Total number of machine resets"),
        &["machine_id"]
    ).expect("Failed to create machine resets counter");

    /// Counter for program loads
    pub static ref PROGRAM_LOADS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("program_loads_total", "Total number of programs loaded"),
        &["machine_id"]
    ).expect("Failed to create program loads counter");
}

/// Register every collector with the global registry. Call once.
pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(CPU_INSTRUCTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CPU_STEPS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INSTRUCTION_DURATION.clone()))?;
    REGISTRY.register(Box::new(CPU_FAULTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(API_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(API_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(ACTIVE_MACHINES.clone()))?;
    REGISTRY.register(Box::new(CPU_REGISTER_VALUES.clone()))?;
    REGISTRY.register(Box::new(CPU_FLAGS.clone()))?;
    REGISTRY.register(Box::new(MACHINE_RESETS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROGRAM_LOADS_TOTAL.clone()))?;
    Ok(())
}

/// Record one executed instruction
pub fn record_instruction(opcode: u8, instruction_name: &str, duration: Duration) {
    CPU_INSTRUCTIONS_TOTAL
        .with_label_values(&[&format!("0x{:02X}", opcode), instruction_name])
        .inc();

    CPU_STEPS_TOTAL.inc();

    INSTRUCTION_DURATION
        .with_label_values(&[instruction_name])
        .observe(duration.as_secs_f64());
}

pub fn record_fault(kind: &str) {
    CPU_FAULTS_TOTAL.with_label_values(&[kind]).inc();
}

/// Record an API request
pub fn record_api_request(method: &str, endpoint: &str, status: u16, duration: Duration) {
    API_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();

    API_REQUEST_DURATION
        .with_label_values(&[method, endpoint])
        .observe(duration.as_secs_f64());
}

pub fn set_active_machines(count: usize) {
    ACTIVE_MACHINES.set(count as f64);
}

/// Update register and flag gauges for a machine
pub fn update_cpu_state(machine_id: &str, registers: &RegisterSnapshot, pc: u8, flags: &FlagRegister) {
    let values = [
        ("A", registers.a),
        ("B", registers.b),
        ("C", registers.c),
        ("D", registers.d),
        ("E", registers.e),
        ("PC", pc),
    ];
    for (name, value) in values {
        CPU_REGISTER_VALUES
            .with_label_values(&[machine_id, name])
            .set(value as f64);
    }

    let states = [
        ("carry", flags.carry()),
        ("zero", flags.zero()),
        ("overflow", flags.overflow()),
        ("negative", flags.negative()),
    ];
    for (name, set) in states {
        CPU_FLAGS
            .with_label_values(&[machine_id, name])
            .set(if set { 1.0 } else { 0.0 });
    }
}

pub fn forget_machine(machine_id: &str) {
    for name in ["A", "B", "C", "D", "E", "PC"] {
        let _ = CPU_REGISTER_VALUES.remove_label_values(&[machine_id, name]);
    }
    for name in ["carry", "zero", "overflow", "negative"] {
        let _ = CPU_FLAGS.remove_label_values(&[machine_id, name]);
    }
    let _ = MACHINE_RESETS_TOTAL.remove_label_values(&[machine_id]);
    let _ = PROGRAM_LOADS_TOTAL.remove_label_values(&[machine_id]);
}

pub fn record_machine_reset(machine_id: &str) {
    MACHINE_RESETS_TOTAL.with_label_values(&[machine_id]).inc();
}

pub fn record_program_load(machine_id: &str) {
    PROGRAM_LOADS_TOTAL.with_label_values(&[machine_id]).inc();
}

/// Helper struct for timing operations
pub struct Timer {
    start: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
