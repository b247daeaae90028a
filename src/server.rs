use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;
use warp::Filter;

use crate::config::ServerConfig;
use crate::cpu::{RunState, CPU};
use crate::error::CpuError;
use crate::flags::FlagRegister;
use crate::metrics::{
    forget_machine, init_metrics, record_api_request, record_machine_reset, record_program_load,
    set_active_machines, update_cpu_state, Timer, REGISTRY,
};
use crate::program::ProgramImage;
use crate::registers::RegisterSnapshot;
use crate::trace::{ScriptedInput, StepEvent};
use crate::LOG_TARGET;

#[derive(Debug, Clone, Serialize)]
pub struct CpuState {
    pub registers: RegisterSnapshot,
    pub flags: FlagRegister,
    pub pc: u8,
    pub state: RunState,
    pub instructions: u64,
    pub halted: bool,
    pub pending_input: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MachineState {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub cpu: CpuState,
}

#[derive(Debug, Deserialize)]
pub struct MemoryWrite {
    pub address: u8,
    pub value: u8,
}

#[derive(Debug, Deserialize)]
pub struct MemoryRead {
    pub address: u8,
    pub length: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct MemoryData {
    pub address: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct ProgramLoad {
    pub data: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct InputValues {
    pub values: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteSteps {
    pub steps: u32,
}

#[derive(Debug, Serialize)]
pub struct StepResult {
    pub event: Option<StepEvent>,
    pub state: CpuState,
}

#[derive(Debug, Serialize)]
pub struct ExecutionResult {
    pub steps_executed: u64,
    pub halted: bool,
    pub final_state: CpuState,
}

/// Where and why an instruction faulted.
#[derive(Debug, Serialize)]
pub struct FaultInfo {
    pub kind: &'static str,
    pub pc: u8,
    pub opcode: Option<u8>,
    /// Set for arithmetic-unit defects rather than program errors.
    pub internal: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultInfo>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            fault: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            fault: None,
        }
    }

    pub fn fault(err: &CpuError) -> Self {
        if err.is_internal() {
            error!(target: LOG_TARGET, pc = err.pc, %err, "internal arithmetic unit fault");
        }
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            fault: Some(FaultInfo {
                kind: err.fault.kind(),
                pc: err.pc,
                opcode: err.opcode,
                internal: err.is_internal(),
            }),
        }
    }
}

/// One hosted machine with its queued READ input.
pub struct Machine {
    pub cpu: CPU,
    pub input: ScriptedInput,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            cpu: CPU::new(),
            input: ScriptedInput::default(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn cpu_state(&self) -> CpuState {
        CpuState {
            registers: self.cpu.registers().snapshot(),
            flags: *self.cpu.flags(),
            pc: self.cpu.pc(),
            state: self.cpu.state(),
            instructions: self.cpu.instructions_executed(),
            halted: self.cpu.is_halted(),
            pending_input: self.input.remaining(),
        }
    }

    pub fn state(&self, id: &str) -> MachineState {
        MachineState {
            id: id.to_string(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            cpu: self.cpu_state(),
        }
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn step(&mut self) -> Result<StepResult, CpuError> {
        self.touch();
        let event = self.cpu.step(&mut self.input)?;
        Ok(StepResult {
            event,
            state: self.cpu_state(),
        })
    }

    pub fn execute_steps(&mut self, steps: u32) -> Result<ExecutionResult, CpuError> {
        self.touch();
        let summary = self.cpu.run(&mut self.input, Some(steps as u64), |_| {})?;
        Ok(ExecutionResult {
            steps_executed: summary.steps_executed,
            halted: summary.halted,
            final_state: self.cpu_state(),
        })
    }

    pub fn load_program(&mut self, data: &[u8]) -> Result<(), String> {
        self.touch();
        let program = ProgramImage::new(data).map_err(|e| e.to_string())?;
        self.cpu.load_program(program);
        Ok(())
    }

    pub fn read_memory(&self, address: u8, length: u8) -> Result<Vec<u8>, String> {
        (0..length)
            .map(|i| {
                let addr = address
                    .checked_add(i)
                    .ok_or_else(|| "memory range overflows".to_string())?;
                self.cpu.memory().read(addr).map_err(|e| e.to_string())
            })
            .collect()
    }

    pub fn write_memory(&mut self, address: u8, value: u8) -> Result<(), String> {
        self.touch();
        self.cpu
            .memory_mut()
            .write(address, value)
            .map_err(|e| e.to_string())
    }

    pub fn reset(&mut self) {
        self.touch();
        self.cpu.reset();
    }
}

pub type MachineMap = Arc<Mutex<HashMap<String, Machine>>>;

fn lock(machines: &MachineMap) -> MutexGuard<'_, HashMap<String, Machine>> {
    machines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn not_found<T>() -> ApiResponse<T> {
    ApiResponse::error("Machine not found".to_string())
}

fn publish_state(id: &str, machine: &Machine) {
    let cpu = &machine.cpu;
    update_cpu_state(id, &cpu.registers().snapshot(), cpu.pc(), cpu.flags());
}

pub async fn run_server(config: ServerConfig) {
    if let Err(e) = init_metrics() {
        error!(target: LOG_TARGET, %e, "failed to register metrics");
    }

    let machines: MachineMap = Arc::new(Mutex::new(HashMap::new()));

    info!(target: LOG_TARGET, listen = %config.listen, "8-bit processor service starting");
    info!(target: LOG_TARGET, "  POST   /machine              - Create new machine instance");
    info!(target: LOG_TARGET, "  GET    /machine/:id          - Get machine state");
    info!(target: LOG_TARGET, "  POST   /machine/:id/reset    - Reset machine");
    info!(target: LOG_TARGET, "  POST   /machine/:id/step     - Execute single instruction");
    info!(target: LOG_TARGET, "  POST   /machine/:id/execute  - Execute multiple instructions");
    info!(target: LOG_TARGET, "  POST   /machine/:id/program  - Load program image");
    info!(target: LOG_TARGET, "  GET    /machine/:id/memory   - Read memory");
    info!(target: LOG_TARGET, "  POST   /machine/:id/memory   - Write memory");
    info!(target: LOG_TARGET, "  POST   /machine/:id/input    - Queue READ input values");
    info!(target: LOG_TARGET, "  GET    /machines             - List all machine instances");
    info!(target: LOG_TARGET, "  DELETE /machine/:id          - Delete machine instance");
    info!(target: LOG_TARGET, "  GET    /metrics              - Prometheus metrics endpoint");

    warp::serve(routes(machines, &config)).run(config.listen).await;
}

pub fn routes(
    machines: MachineMap,
    config: &ServerConfig,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let max_steps = config.max_steps_per_request;

    // CORS
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"]);

    let create_machine = warp::path("machine")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_machines(machines.clone()))
        .and_then(create_machine_handler);

    let get_state = warp::path!("machine" / String)
        .and(warp::get())
        .and(with_machines(machines.clone()))
        .and_then(get_state_handler);

    let reset_machine = warp::path!("machine" / String / "reset")
        .and(warp::post())
        .and(with_machines(machines.clone()))
        .and_then(reset_handler);

    let step_machine = warp::path!("machine" / String / "step")
        .and(warp::post())
        .and(with_machines(machines.clone()))
        .and_then(step_handler);

    let execute_steps = warp::path!("machine" / String / "execute")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_machines(machines.clone()))
        .and(warp::any().map(move || max_steps))
        .and_then(execute_handler);

    let load_program = warp::path!("machine" / String / "program")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_machines(machines.clone()))
        .and_then(load_program_handler);

    let read_memory = warp::path!("machine" / String / "memory")
        .and(warp::get())
        .and(warp::query::<MemoryRead>())
        .and(with_machines(machines.clone()))
        .and_then(read_memory_handler);

    let write_memory = warp::path!("machine" / String / "memory")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_machines(machines.clone()))
        .and_then(write_memory_handler);

    let queue_input = warp::path!("machine" / String / "input")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_machines(machines.clone()))
        .and_then(queue_input_handler);

    let list_machines = warp::path("machines")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_machines(machines.clone()))
        .and_then(list_machines_handler);

    let delete_machine = warp::path!("machine" / String)
        .and(warp::delete())
        .and(with_machines(machines))
        .and_then(delete_machine_handler);

    let metrics = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(metrics_handler);

    create_machine
        .or(get_state)
        .or(reset_machine)
        .or(step_machine)
        .or(execute_steps)
        .or(load_program)
        .or(read_memory)
        .or(write_memory)
        .or(queue_input)
        .or(list_machines)
        .or(delete_machine)
        .or(metrics)
        .with(cors)
}

fn with_machines(
    machines: MachineMap,
) -> impl Filter<Extract = (MachineMap,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || machines.clone())
}

async fn create_machine_handler(machines: MachineMap) -> Result<impl warp::Reply, warp::Rejection> {
    let timer = Timer::new();
    let id = Uuid::new_v4().to_string();
    let machine = Machine::new();
    let state = machine.state(&id);
    publish_state(&id, &machine);

    {
        let mut machines_lock = lock(&machines);
        machines_lock.insert(id.clone(), machine);
        set_active_machines(machines_lock.len());
    }

    info!(target: LOG_TARGET, machine = %id, "machine created");
    record_api_request("POST", "/machine", 200, timer.elapsed());
    Ok(warp::reply::json(&ApiResponse::success(state)))
}

async fn get_state_handler(id: String, machines: MachineMap) -> Result<impl warp::Reply, warp::Rejection> {
    let machines_lock = lock(&machines);

    let response = match machines_lock.get(&id) {
        Some(machine) => ApiResponse::success(machine.state(&id)),
        None => not_found(),
    };
    Ok(warp::reply::json(&response))
}

async fn reset_handler(id: String, machines: MachineMap) -> Result<impl warp::Reply, warp::Rejection> {
    let mut machines_lock = lock(&machines);

    let response = match machines_lock.get_mut(&id) {
        Some(machine) => {
            machine.reset();
            record_machine_reset(&id);
            publish_state(&id, machine);
            ApiResponse::success(machine.state(&id))
        }
        None => not_found(),
    };
    Ok(warp::reply::json(&response))
}

async fn step_handler(id: String, machines: MachineMap) -> Result<impl warp::Reply, warp::Rejection> {
    let timer = Timer::new();
    let mut machines_lock = lock(&machines);

    let response = match machines_lock.get_mut(&id) {
        Some(machine) => {
            let result = machine.step();
            publish_state(&id, machine);
            match result {
                Ok(step) => ApiResponse::success(step),
                Err(e) => ApiResponse::fault(&e),
            }
        }
        None => not_found(),
    };

    record_api_request("POST", "/machine/:id/step", 200, timer.elapsed());
    Ok(warp::reply::json(&response))
}

async fn execute_handler(
    id: String,
    request: ExecuteSteps,
    machines: MachineMap,
    max_steps: u32,
) -> Result<impl warp::Reply, warp::Rejection> {
    let timer = Timer::new();
    let mut machines_lock = lock(&machines);

    let response = match machines_lock.get_mut(&id) {
        Some(machine) => {
            let result = machine.execute_steps(request.steps.min(max_steps));
            publish_state(&id, machine);
            match result {
                Ok(execution) => ApiResponse::success(execution),
                Err(e) => ApiResponse::fault(&e),
            }
        }
        None => not_found(),
    };

    record_api_request("POST", "/machine/:id/execute", 200, timer.elapsed());
    Ok(warp::reply::json(&response))
}

async fn load_program_handler(id: String, request: ProgramLoad, machines: MachineMap) -> Result<impl warp::Reply, warp::Rejection> {
    let mut machines_lock = lock(&machines);

    let response = match machines_lock.get_mut(&id) {
        Some(machine) => match machine.load_program(&request.data) {
            Ok(()) => {
                record_program_load(&id);
                publish_state(&id, machine);
                ApiResponse::success(format!("Loaded {} program bytes", request.data.len()))
            }
            Err(e) => ApiResponse::error(e),
        },
        None => not_found(),
    };
    Ok(warp::reply::json(&response))
}

async fn read_memory_handler(id: String, query: MemoryRead, machines: MachineMap) -> Result<impl warp::Reply, warp::Rejection> {
    let machines_lock = lock(&machines);

    let response = match machines_lock.get(&id) {
        Some(machine) => {
            let length = query.length.unwrap_or(1);
            match machine.read_memory(query.address, length) {
                Ok(data) => ApiResponse::success(MemoryData {
                    address: query.address,
                    data,
                }),
                Err(e) => ApiResponse::error(e),
            }
        }
        None => not_found(),
    };
    Ok(warp::reply::json(&response))
}

async fn write_memory_handler(id: String, request: MemoryWrite, machines: MachineMap) -> Result<impl warp::Reply, warp::Rejection> {
    let mut machines_lock = lock(&machines);

    let response = match machines_lock.get_mut(&id) {
        Some(machine) => match machine.write_memory(request.address, request.value) {
            Ok(()) => ApiResponse::success(format!(
                "Wrote {} to MEM[{}]",
                request.value, request.address
            )),
            Err(e) => ApiResponse::error(e),
        },
        None => not_found(),
    };
    Ok(warp::reply::json(&response))
}

async fn queue_input_handler(id: String, request: InputValues, machines: MachineMap) -> Result<impl warp::Reply, warp::Rejection> {
    let mut machines_lock = lock(&machines);

    let response = match machines_lock.get_mut(&id) {
        Some(machine) => {
            for value in request.values {
                machine.input.push(value);
            }
            machine.touch();
            ApiResponse::success(machine.state(&id))
        }
        None => not_found(),
    };
    Ok(warp::reply::json(&response))
}

async fn list_machines_handler(machines: MachineMap) -> Result<impl warp::Reply, warp::Rejection> {
    let machines_lock = lock(&machines);

    let machine_list: Vec<MachineState> = machines_lock
        .iter()
        .map(|(id, machine)| machine.state(id))
        .collect();

    Ok(warp::reply::json(&ApiResponse::success(machine_list)))
}

async fn delete_machine_handler(id: String, machines: MachineMap) -> Result<impl warp::Reply, warp::Rejection> {
    let timer = Timer::new();
    let mut machines_lock = lock(&machines);

    let response = match machines_lock.remove(&id) {
        Some(_) => {
            set_active_machines(machines_lock.len());
            forget_machine(&id);
            info!(target: LOG_TARGET, machine = %id, "machine deleted");
            ApiResponse::success(format!("Machine {} deleted", id))
        }
        None => not_found(),
    };

    record_api_request("DELETE", "/machine/:id", 200, timer.elapsed());
    Ok(warp::reply::json(&response))
}

async fn metrics_handler() -> Result<impl warp::Reply, warp::Rejection> {
    let timer = Timer::new();
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_text) => {
            record_api_request("GET", "/metrics", 200, timer.elapsed());
            Ok(warp::reply::with_header(
                metrics_text,
                "content-type",
                "text/plain; version=0.0.4",
            ))
        }
        Err(_) => {
            record_api_request("GET", "/metrics", 500, timer.elapsed());
            Ok(warp::reply::with_header(
                "Error encoding metrics".to_string(),
                "content-type",
                "text/plain",
            ))
        }
    }
}
