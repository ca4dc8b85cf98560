//! The broadcaster: fixed-interval physics advance and snapshot fan-out.

use crate::physics;
use crate::registry::Registry;
use log::{debug, error, info, warn};
use shared::{encode, Envelope};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

// Cap the delta time so a stalled tick cannot launch players through
// platforms.
const MAX_DELTA_TIME: f32 = 1.0 / 20.0;

/// Runs the tick loop until the shutdown signal fires.
///
/// Each tick advances physics for every registered player and fans the
/// resulting snapshot out to every session. The snapshot and the target list
/// are captured under the registry lock; the sends happen after it is
/// released, so a slow client never extends the critical section. Sessions
/// whose channel is closed are removed after the fan-out completes.
pub async fn run(
    registry: Arc<Mutex<Registry>>,
    tick_rate: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut timer = interval(Duration::from_secs_f32(1.0 / tick_rate as f32));
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_tick = Instant::now();
    let mut tick: u64 = 0;

    // Skip the first tick since it fires immediately
    timer.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("tick loop shutting down");
                break;
            }
            _ = timer.tick() => {}
        }

        let now = Instant::now();
        let mut dt = (now - last_tick).as_secs_f32();
        last_tick = now;
        if dt > MAX_DELTA_TIME {
            debug!("large delta time {:.3}s, capping to {:.3}s", dt, MAX_DELTA_TIME);
            dt = MAX_DELTA_TIME;
        }

        tick += 1;

        let (line, targets) = {
            let mut guard = registry.lock().await;
            let registry = &mut *guard;

            for player in registry.players.values_mut() {
                physics::step(player, &registry.platforms, dt);
            }

            if registry.players.is_empty() {
                continue;
            }

            let snapshot = registry.snapshot();
            let line = match encode(&snapshot) {
                Ok(line) => line,
                Err(e) => {
                    error!("failed to encode snapshot: {}", e);
                    continue;
                }
            };
            (line, registry.sessions())
        };

        // Fan out; removals are applied only after the iteration completes.
        let mut failed = Vec::new();
        for (id, outbound) in targets {
            if outbound.send(line.clone()).is_err() {
                failed.push(id);
            }
        }

        if !failed.is_empty() {
            let mut registry = registry.lock().await;
            for id in failed {
                warn!("dropping unreachable session {}", id);
                if registry.unregister(id).is_some() {
                    registry.broadcast(&Envelope::PlayerLeft { player_id: id }, None);
                }
            }
        }

        if tick % tick_rate as u64 == 0 {
            let count = registry.lock().await.len();
            if count > 0 {
                debug!("tick {}: {} players, {:.1}Hz", tick, count, 1.0 / dt);
            }
        }
    }
}
