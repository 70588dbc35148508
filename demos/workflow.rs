//! End-to-end walk through the stock workflow.
//!
//! Run with `STOCK_LOG=debug` to see store traffic, and set
//! `STOCK__REMOTE__URL` to mirror rows to a spreadsheet web app.

use anyhow::Context;
use stock_approval::{
    config::StockConfig,
    error::LedgerError,
    request::RequestDraft,
    service::StockService,
    telemetry,
    types::{MovementType, RequestStatus},
};

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let mut config = StockConfig::load(None).context("loading configuration")?;
    let temp_dir = tempfile::tempdir()?;
    config.storage.path = temp_dir.path().join("workflow.db");

    let mut service = StockService::from_config(&config)?;
    if !service.authenticate(&config.admin.password) {
        anyhow::bail!("admin password rejected");
    }

    service.adjust_stock("m1", MovementType::Entrada, 10, None)?;
    service.adjust_stock("m8", MovementType::Entrada, 3, Some("Compra"))?;

    let luva = service
        .requestable_materials("luva")
        .first()
        .map(|item| (*item).clone())
        .context("no gloves in stock")?;
    let fita = service
        .requestable_materials("fita")
        .first()
        .map(|item| (*item).clone())
        .context("no tape in stock")?;

    let first = RequestDraft::new()
        .set_vtr("12")
        .set_requester("Ana")
        .add_item(&luva, 4)?
        .add_item(&fita, 1)?
        .finalise()?;
    let first = service.submit_request(first)?;

    let second = RequestDraft::new()
        .set_vtr("31")
        .set_requester("Rui")
        .add_item(&luva, 10)?
        .finalise()?;
    let second = service.submit_request(second)?;

    for request in service.pending_requests() {
        println!("awaiting decision: VTR {} ({})", request.vtr, request.items_summary());
    }
    service.set_status(&first.id, RequestStatus::Atendido)?;

    // gloves were drawn down by the first request
    match service.set_status(&second.id, RequestStatus::Atendido) {
        Err(LedgerError::InsufficientStock { shortages, .. }) => {
            for s in shortages {
                println!(
                    "short on {}: requested {}, available {}",
                    s.material_id, s.requested, s.available
                );
            }
            service.set_status(&second.id, RequestStatus::NaoAtendido)?;
        }
        other => {
            other?;
        }
    }

    for item in service.search_inventory("") {
        println!("{:>4} {:<28} {}", item.code(), item.name(), item.quantity);
    }
    for request in service.requests() {
        println!("VTR {} {} [{}] {}", request.vtr, request.requester_name, request.status, request.items_summary());
    }
    println!("log consistent: {}", service.is_consistent()?);

    service.close()?;
    Ok(())
}
