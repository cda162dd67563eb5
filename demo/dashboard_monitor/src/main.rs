mod config;
use config::MonitorConfig;
use greenhealth_core::copilot::{RejectReason, SendOutcome, SUGGESTIONS};
use greenhealth_core::model::KNOWN_DEPARTMENTS;
use greenhealth_core::{logging, CopilotSession, DashboardView, PushState, TelemetryTransport};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    logging::init_with_default("info,greenhealth_core=info,dashboard_monitor=info");

    let cfg = MonitorConfig::load();
    cfg.api.validate()?;
    info!(
        target: "dashboard_monitor",
        base_url = %cfg.api.base_url,
        push = cfg.api.push_enabled,
        "Starting dashboard monitor"
    );

    let transport = TelemetryTransport::http(&cfg.api)?;
    let copilot = Arc::new(CopilotSession::http(&cfg.api)?);
    transport.start().await;

    // Re-render on every accepted state change
    let mut snapshots = transport.subscribe();
    let json_output = cfg.json_output;
    let rows = cfg.leaderboard_rows;
    let view_task = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let view = snapshots.borrow_and_update().view.clone();
            if json_output {
                match serde_json::to_string(&view) {
                    Ok(line) => println!("{line}"),
                    Err(e) => {
                        warn!(target: "dashboard_monitor", error = %e, "Failed to encode view")
                    }
                }
            } else {
                render(&view, rows);
            }
        }
    });

    let mut push_states = transport.push_state();
    let push_task = tokio::spawn(async move {
        while push_states.changed().await.is_ok() {
            let state = *push_states.borrow_and_update();
            match state {
                PushState::Reconnecting { attempt, delay_ms } => {
                    println!("[push] reconnecting (attempt {attempt}) in {delay_ms} ms")
                }
                PushState::PullOnly => {
                    println!("[push] unavailable; refreshing every pull interval")
                }
                other => println!("[push] {other:?}"),
            }
        }
    });

    println!("Ask the copilot anything. Suggestions:");
    for s in SUGGESTIONS {
        println!("  - {s}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!(target: "dashboard_monitor", "Shutting down...");
                break;
            }
            line = lines.next_line() => {
                let Ok(Some(line)) = line else {
                    info!(target: "dashboard_monitor", "Input closed; shutting down");
                    break;
                };
                let copilot = Arc::clone(&copilot);
                tokio::spawn(async move { ask(&copilot, &line).await });
            }
        }
    }

    transport.stop().await;
    view_task.abort();
    push_task.abort();
    Ok(())
}

async fn ask(copilot: &CopilotSession, line: &str) {
    match copilot.send(line).await {
        SendOutcome::Rejected(RejectReason::Empty) => {}
        SendOutcome::Rejected(RejectReason::InFlight) => {
            println!("[copilot] still waiting for the previous answer")
        }
        SendOutcome::Answered { .. } | SendOutcome::Degraded => {
            if let Some(reply) = copilot.history().last() {
                let sources = if reply.source_count > 0 {
                    format!(" ({} sources)", reply.source_count)
                } else {
                    String::new()
                };
                println!("[{}] copilot: {}{}", reply.time_label(), reply.content, sources);
            }
        }
    }
}

fn render(view: &DashboardView, rows: usize) {
    let k = &view.kpis;
    println!(
        "score {:.0}/100 | energy {} | waste {} | paper {} | alerts {} (high {}, medium {}, low {})",
        view.normalized_score,
        k.energy_kwh.display_with_unit("kWh"),
        k.medical_waste_kg.display_with_unit("kg"),
        k.paper_kg.display_with_unit("kg"),
        k.active_alerts,
        view.severity.high,
        view.severity.medium,
        view.severity.low,
    );
    for (rank, row) in view.leaderboard.iter().take(rows).enumerate() {
        println!(
            "  {:>2}. {:<12}{} {:>5.1}",
            rank + 1,
            row.department,
            department_marker(&row.department),
            row.score
        );
    }
}

/// `?` for departments outside the backend's reference schema
fn department_marker(department: &str) -> char {
    if KNOWN_DEPARTMENTS.contains(&department) {
        ' '
    } else {
        '?'
    }
}
