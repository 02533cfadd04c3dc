//! Application lifecycle management.
//!
//! Headless driver loop: pans a camera across the world, draws the visible
//! area into a counting sink, performs periodic edits and evicts far chunks.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use torus_common::WorldId;
use torus_world::{
    CameraRect, FileOverlayStore, ObjectKind, OverlayStore, PlacedEntity, WorldStateService,
};

use crate::config::EngineConfig;
use crate::timing::TickTimer;

/// Counts draw calls per object kind.
#[derive(Debug, Default)]
pub struct DrawCounter {
    counts: BTreeMap<String, usize>,
    total: usize,
}

impl DrawCounter {
    /// Records one draw call.
    pub fn record(&mut self, kind: &ObjectKind) {
        *self.counts.entry(kind.as_str().to_string()).or_default() += 1;
        self.total += 1;
    }

    /// Calls recorded for a kind.
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    /// All calls recorded.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }
}

impl std::fmt::Display for DrawCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} draw calls", self.total)?;
        for (kind, count) in &self.counts {
            write!(f, ", {kind}: {count}")?;
        }
        Ok(())
    }
}

/// What a simulated edit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditAction {
    Harvest,
    Place,
    Revert,
}

/// Summary of a finished run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Ticks executed
    pub ticks: u32,
    /// Draw calls per kind
    pub draws: DrawCounter,
    /// Edits that changed the overlay
    pub edits: usize,
    /// Chunks evicted over the run
    pub evicted: usize,
    /// Ticks whose chunk reads failed
    pub failed_ticks: u32,
}

fn simulate_edit(
    service: &WorldStateService,
    rng: &mut fastrand::Rng,
    tick: u32,
    (px, py): (f64, f64),
) -> Result<bool> {
    let action = match rng.u8(0..3) {
        0 => EditAction::Harvest,
        1 => EditAction::Place,
        _ => EditAction::Revert,
    };
    let changed = match action {
        EditAction::Harvest => {
            let kind = if rng.bool() { "tree" } else { "rock" };
            service.harvest_entity(px, py, kind)?
        },
        EditAction::Place => {
            let entity =
                PlacedEntity::new("campfire").with_metadata("placed_tick", tick.to_string());
            service.place_entity(px, py, entity)?;
            true
        },
        EditAction::Revert => service.revert_cell(px, py)?,
    };
    debug!("Tick {tick}: {action:?} at ({px:.0}, {py:.0}) changed={changed}");
    Ok(changed)
}

/// Runs the driver loop to completion.
pub fn run(config: &EngineConfig) -> Result<RunSummary> {
    let world_id = WorldId::new(config.world_id);
    let store = FileOverlayStore::open(&config.save_dir)
        .with_context(|| format!("opening overlay store at {}", config.save_dir.display()))?;
    if config.reset_world && store.delete_world(world_id).context("deleting world")? {
        info!("Reset world {world_id}");
    }
    let saved = store.worlds().context("listing worlds")?;
    info!("{} saved worlds in {}", saved.len(), config.save_dir.display());

    let service = WorldStateService::new(world_id, config.world.clone(), Arc::new(store))
        .context("building world")?
        .with_keep_distance(config.keep_distance);

    info!("{}", service.info());

    let geometry = *service.geometry();
    let (mut cam_x, mut cam_y) = service.starting_position();
    let mut rng = fastrand::Rng::with_seed(config.world.seed);
    let mut timer = TickTimer::new(config.tick_rate);
    let mut summary = RunSummary::default();
    let edit_interval = config.edit_interval.max(1);
    let (view_w, view_h) = (
        f64::from(config.viewport_width),
        f64::from(config.viewport_height),
    );

    for tick in 1..=config.ticks {
        timer.begin();

        // Diagonal pan; wrapping keeps the camera in world space while the
        // view itself straddles the seam
        (cam_x, cam_y) =
            geometry.wrap_pixel(cam_x + config.camera_speed, cam_y + config.camera_speed / 2.0);
        let camera = CameraRect::new(cam_x, cam_y, view_w, view_h);

        let draws = &mut summary.draws;
        if let Err(e) = service.draw_visible(&camera, |kind, _, _| draws.record(kind)) {
            warn!("Tick {tick}: visible area unavailable: {e}");
            summary.failed_ticks += 1;
        }

        if tick % edit_interval == 0 {
            match simulate_edit(&service, &mut rng, tick, (cam_x, cam_y)) {
                Ok(true) => summary.edits += 1,
                Ok(false) => {},
                Err(e) => warn!("Tick {tick}: edit failed: {e}"),
            }
        }

        summary.evicted += service.tick(cam_x, cam_y);
        summary.ticks = tick;
        timer.end();
    }

    info!("{}", service.info());
    info!("{}", summary.draws);
    info!(
        "{} edits, {} chunks evicted, {} failed ticks",
        summary.edits, summary.evicted, summary.failed_ticks
    );
    info!(
        "Tick time: avg {:.3} ms, worst {:.3} ms",
        timer.average_ms(),
        timer.worst_ms()
    );
    match service.overlay_stats() {
        Ok(stats) => info!("Overlay: {stats}"),
        Err(e) => warn!("Overlay stats unavailable: {e}"),
    }

    Ok(summary)
}
