//! desk-runner: headless runner for the civic complaint core.
//!
//! Usage:
//!   desk-runner --db desk.db                        one escalation sweep + summary
//!   desk-runner --db desk.db --lat 19.07 --lng 72.87   admin-area + ward lookup
//!   desk-runner --db desk.db --timeline <complaint_id>
//!   desk-runner --db desk.db --ipc-mode             JSON lines on stdin/stdout
//!
//! Common flags: --data-dir (default ./data), --areas <geojson>, --demo-mode,
//! --now <rfc3339> (pin the clock, e.g. to replay a sweep).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use civicdesk_core::{
    admin_area::AdminAreaResolver,
    clock::ManualClock,
    complaint::{CreateComplaint, GeoPoint, ResolutionProof, UpdateComplaint},
    complaint_service::ComplaintService,
    config::CoreConfig,
    error::CoreError,
    query_planner::ComplaintFilters,
    role::{InMemoryRoleDirectory, RoleDirectory, RoleProfile},
    store::CoreStore,
    ward::assign_ward,
};
use serde_json::{json, Value};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Create {
        complaint: CreateComplaint,
    },
    Get {
        complaint_id: String,
    },
    List {
        caller: String,
        #[serde(default)]
        filters: ComplaintFilters,
    },
    Update {
        caller: String,
        complaint_id: String,
        change: UpdateComplaint,
    },
    Resolve {
        caller: String,
        complaint_id: String,
        proof: ResolutionProof,
        #[serde(default)]
        admin_location: Option<GeoPoint>,
    },
    Reject {
        caller: String,
        complaint_id: String,
        reason: String,
    },
    Reopen {
        caller: String,
        complaint_id: String,
        reason: String,
    },
    Timeline {
        complaint_id: String,
    },
    Lookup {
        lat: f64,
        lng: f64,
    },
    Sweep,
    Summary,
    Quit,
}

/// One row of `config/roles.json`, as the identity layer hands it over.
#[derive(serde::Deserialize)]
struct RawRole {
    user_id: String,
    role: String,
    admin_level: Option<String>,
    assigned_ward: Option<String>,
    assigned_city: Option<String>,
}

#[derive(serde::Serialize)]
struct DeskSummary {
    complaints: i64,
    open: i64,
    escalated: i64,
    demo_mode: bool,
    areas_loaded: bool,
}

struct Desk {
    service: ComplaintService,
    areas: Arc<AdminAreaResolver>,
    roles: InMemoryRoleDirectory,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let demo_mode = args.iter().any(|a| a == "--demo-mode");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");

    let mut config = match CoreConfig::load(data_dir) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("{e:#}; using built-in defaults");
            CoreConfig::default()
        }
    };
    if demo_mode {
        config = config.with_demo_mode(true);
    }

    let areas_path = match flag_value(&args, "--areas") {
        Some(p) => Path::new(p).to_path_buf(),
        None => Path::new(data_dir).join(&config.admin_areas_path),
    };

    if !ipc_mode {
        println!("CivicDesk - desk-runner");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!("  areas:     {}", areas_path.display());
        println!("  demo_mode: {}", config.demo_mode);
        println!();
    }

    let store = if db == ":memory:" {
        CoreStore::in_memory()?
    } else {
        CoreStore::open(db)?
    };
    store.migrate()?;

    let areas = Arc::new(AdminAreaResolver::from_file(areas_path));
    let mut service = ComplaintService::new(store, config, Arc::clone(&areas));
    if let Some(raw) = flag_value(&args, "--now") {
        let at: DateTime<Utc> = DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("--now expects an RFC 3339 timestamp, got {raw}"))?
            .with_timezone(&Utc);
        log::info!("clock pinned at {at}");
        service = service.with_clock(Arc::new(ManualClock::new(at)));
    }
    let desk = Desk {
        service,
        areas,
        roles: load_roles(data_dir)?,
    };

    if ipc_mode {
        return run_ipc_loop(&desk);
    }

    let lat = parse_arg(&args, "--lat", f64::NAN);
    let lng = parse_arg(&args, "--lng", f64::NAN);
    if lat.is_finite() && lng.is_finite() {
        let out = lookup(&desk, lat, lng)?;
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if let Some(id) = flag_value(&args, "--timeline") {
        for entry in desk.service.get_timeline(id)? {
            println!(
                "  {} {:<14} {:<12} {}",
                entry.timestamp.to_rfc3339(),
                entry.kind.as_str(),
                entry.actor_role,
                entry.note.as_deref().unwrap_or("")
            );
        }
        return Ok(());
    }

    let report = desk.service.sweeper().sweep(desk.service.store())?;
    println!("=== SWEEP ===");
    println!("  swept at:       {}", report.swept_at.to_rfc3339());
    println!("  escalated:      {}", report.escalated.len());
    println!("  audit failures: {}", report.log_failures);
    println!();
    print_summary(&desk)
}

fn run_ipc_loop(desk: &Desk) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = json!({
                    "ok": false,
                    "error": { "kind": "validation", "message": e.to_string() }
                });
                writeln!(stdout, "{err_json}")?;
                stdout.flush()?;
                continue;
            }
        };

        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        let response = match handle_command(desk, cmd) {
            Ok(data) => json!({ "ok": true, "data": data }),
            Err(e) => json!({ "ok": false, "error": error_json(&e) }),
        };
        writeln!(stdout, "{response}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(desk: &Desk, cmd: IpcCommand) -> Result<Value, CoreError> {
    let service = &desk.service;
    let value = match cmd {
        IpcCommand::Create { complaint } => serde_json::to_value(service.create(complaint)?)?,
        IpcCommand::Get { complaint_id } => serde_json::to_value(service.get(&complaint_id)?)?,
        IpcCommand::List { caller, filters } => {
            let caller = desk.roles.role_profile(&caller)?;
            serde_json::to_value(service.list(&filters, &caller)?)?
        }
        IpcCommand::Update {
            caller,
            complaint_id,
            change,
        } => {
            let caller = desk.roles.role_profile(&caller)?;
            serde_json::to_value(service.update(&complaint_id, change, &caller)?)?
        }
        IpcCommand::Resolve {
            caller,
            complaint_id,
            proof,
            admin_location,
        } => {
            let caller = desk.roles.role_profile(&caller)?;
            serde_json::to_value(service.resolve(&complaint_id, proof, admin_location, &caller)?)?
        }
        IpcCommand::Reject {
            caller,
            complaint_id,
            reason,
        } => {
            let caller = desk.roles.role_profile(&caller)?;
            serde_json::to_value(service.reject(&complaint_id, &reason, &caller)?)?
        }
        IpcCommand::Reopen {
            caller,
            complaint_id,
            reason,
        } => {
            let caller = desk.roles.role_profile(&caller)?;
            serde_json::to_value(service.reopen(&complaint_id, &reason, &caller)?)?
        }
        IpcCommand::Timeline { complaint_id } => {
            serde_json::to_value(service.get_timeline(&complaint_id)?)?
        }
        IpcCommand::Lookup { lat, lng } => lookup(desk, lat, lng)?,
        IpcCommand::Sweep => serde_json::to_value(service.sweeper().sweep(service.store())?)?,
        IpcCommand::Summary => serde_json::to_value(build_summary(desk)?)?,
        IpcCommand::Quit => Value::Null,
    };
    Ok(value)
}

fn error_json(e: &CoreError) -> Value {
    let mut out = json!({ "kind": e.kind(), "message": e.to_string() });
    if let CoreError::StateConflict {
        distance_m: Some(d),
        ..
    } = e
    {
        out["distance_m"] = json!(d);
    }
    out
}

fn lookup(desk: &Desk, lat: f64, lng: f64) -> Result<Value, CoreError> {
    let area = desk.areas.lookup(lat, lng)?;
    Ok(json!({
        "area": area,
        "ward_code": assign_ward(None, lat, lng),
    }))
}

fn load_roles(data_dir: &str) -> Result<InMemoryRoleDirectory> {
    let path = format!("{data_dir}/config/roles.json");
    let mut directory = InMemoryRoleDirectory::new();
    if !Path::new(&path).exists() {
        log::info!("no {path}; every caller is treated as a citizen");
        return Ok(directory);
    }

    let content = std::fs::read_to_string(&path).with_context(|| format!("Cannot read {path}"))?;
    let rows: Vec<RawRole> =
        serde_json::from_str(&content).with_context(|| format!("Invalid roles file {path}"))?;
    for row in &rows {
        let profile = RoleProfile::from_raw(
            &row.user_id,
            &row.role,
            row.admin_level.as_deref(),
            row.assigned_ward.as_deref(),
            row.assigned_city.as_deref(),
        )
        .with_context(|| format!("role entry for {}", row.user_id))?;
        directory.insert(profile);
    }
    log::info!("loaded {} role profiles from {path}", rows.len());
    Ok(directory)
}

fn build_summary(desk: &Desk) -> Result<DeskSummary, CoreError> {
    let store = desk.service.store();
    Ok(DeskSummary {
        complaints: store.complaint_count()?,
        open: store.open_complaint_count()?,
        escalated: store.escalated_count()?,
        demo_mode: desk.service.config().demo_mode,
        areas_loaded: desk.areas.is_loaded(),
    })
}

fn print_summary(desk: &Desk) -> Result<()> {
    let s = build_summary(desk)?;
    println!("=== DESK SUMMARY ===");
    println!("  complaints:     {}", s.complaints);
    println!("  open:           {}", s.open);
    println!("  escalated:      {}", s.escalated);
    println!("  demo mode:      {}", s.demo_mode);
    println!("  areas loaded:   {}", s.areas_loaded);
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
