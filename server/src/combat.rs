//! Combat resolution: cooldown gating, attack-point geometry and damage.

use crate::registry::{Player, Registry};
use log::info;
use shared::{Direction, ATTACK_COOLDOWN, ATTACK_DAMAGE, ATTACK_RANGE};
use std::time::{Duration, Instant};

/// Result of an attack attempt by a live session.
#[derive(Debug)]
pub enum AttackOutcome {
    /// Still inside the cooldown window; nothing changed.
    Rejected { remaining: Duration },
    /// Cooldown stamped; every listed defender took damage.
    Resolved { hits: Vec<u32> },
}

/// Resolves one attack. Returns `None` when the attacker is no longer
/// registered (a normal race with disconnect, not an error).
///
/// A resolved attack damages every *other* living player whose position lies
/// within `ATTACK_RANGE` of the attack point. Hits resolve independently:
/// one swing can damage several defenders. Zero-health players are inert —
/// never hit, never removed.
pub fn attempt_attack(
    registry: &mut Registry,
    attacker_id: u32,
    direction: Direction,
    now: Instant,
) -> Option<AttackOutcome> {
    let attacker = registry.find(attacker_id)?;

    if let Some(last) = attacker.last_attack {
        let elapsed = now.duration_since(last);
        if elapsed < ATTACK_COOLDOWN {
            return Some(AttackOutcome::Rejected {
                remaining: ATTACK_COOLDOWN - elapsed,
            });
        }
    }

    let attacker_name = attacker.name.clone();
    let (attack_x, attack_y) = attack_point(attacker, direction);
    registry.find_mut(attacker_id)?.last_attack = Some(now);

    let mut hits = Vec::new();
    for (id, other) in registry.players.iter_mut() {
        if *id == attacker_id || !other.is_alive() {
            continue;
        }

        let dx = other.x - attack_x;
        let dy = other.y - attack_y;
        if (dx * dx + dy * dy).sqrt() <= ATTACK_RANGE {
            other.health = (other.health - ATTACK_DAMAGE).max(0);
            info!(
                "player {} hit player {} (health now {})",
                attacker_id, id, other.health
            );
            hits.push((*id, other.name.clone()));
        }
    }

    for (_, defender_name) in &hits {
        registry
            .chat
            .append(format!("{} hit {}!", attacker_name, defender_name), true);
    }

    Some(AttackOutcome::Resolved {
        hits: hits.into_iter().map(|(id, _)| id).collect(),
    })
}

/// The point a swing lands at: a fixed offset from the attacker's position
/// along the attack direction. `none` falls back to the attacker's facing,
/// and a facing of `none` lands on the attacker's center.
fn attack_point(player: &Player, direction: Direction) -> (f32, f32) {
    let direction = if direction == Direction::None {
        player.direction
    } else {
        direction
    };

    match direction {
        Direction::Up => (player.x + 20.0, player.y - 30.0),
        Direction::Down => (player.x + 20.0, player.y + 70.0),
        Direction::Left => (player.x - 30.0, player.y + 20.0),
        Direction::Right => (player.x + 70.0, player.y + 20.0),
        Direction::None => (player.x + 20.0, player.y + 20.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MAX_HEALTH;
    use tokio::sync::mpsc;

    fn registry_with(names: &[&str]) -> Registry {
        let mut registry = Registry::new(4);
        for name in names {
            let (tx, _rx) = mpsc::unbounded_channel();
            registry.register(name.to_string(), tx).unwrap();
        }
        registry
    }

    fn place(registry: &mut Registry, id: u32, x: f32, y: f32) {
        let player = registry.find_mut(id).unwrap();
        player.x = x;
        player.y = y;
    }

    #[test]
    fn attack_in_range_applies_damage_and_chat_line() {
        let mut registry = registry_with(&["Ann", "Bo"]);
        place(&mut registry, 1, 100.0, 100.0);
        place(&mut registry, 2, 150.0, 100.0);

        let outcome = attempt_attack(&mut registry, 1, Direction::Right, Instant::now());

        match outcome {
            Some(AttackOutcome::Resolved { hits }) => assert_eq!(hits, vec![2]),
            other => panic!("expected resolved attack, got {:?}", other),
        }
        assert_eq!(registry.find(2).unwrap().health, MAX_HEALTH - ATTACK_DAMAGE);

        let tail = registry.chat.tail(10);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].text, "Ann hit Bo!");
        assert!(tail[0].is_system);
    }

    #[test]
    fn attack_out_of_range_hits_nobody() {
        let mut registry = registry_with(&["Ann", "Bo"]);
        place(&mut registry, 1, 100.0, 100.0);
        place(&mut registry, 2, 300.0, 300.0);

        match attempt_attack(&mut registry, 1, Direction::Right, Instant::now()) {
            Some(AttackOutcome::Resolved { hits }) => assert!(hits.is_empty()),
            other => panic!("expected resolved attack, got {:?}", other),
        }
        assert_eq!(registry.find(2).unwrap().health, MAX_HEALTH);
        assert!(registry.chat.is_empty());
    }

    #[test]
    fn cooldown_rejects_then_allows() {
        let mut registry = registry_with(&["Ann", "Bo"]);
        place(&mut registry, 1, 100.0, 100.0);
        place(&mut registry, 2, 150.0, 100.0);

        let base = Instant::now();
        attempt_attack(&mut registry, 1, Direction::Right, base).unwrap();
        assert_eq!(registry.find(2).unwrap().health, MAX_HEALTH - ATTACK_DAMAGE);

        // Half a second later: still cooling down, no damage.
        let early = attempt_attack(
            &mut registry,
            1,
            Direction::Right,
            base + Duration::from_millis(500),
        );
        match early {
            Some(AttackOutcome::Rejected { remaining }) => {
                assert!(remaining <= Duration::from_millis(500));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(registry.find(2).unwrap().health, MAX_HEALTH - ATTACK_DAMAGE);

        // At exactly the cooldown boundary the attack goes through.
        let late = attempt_attack(&mut registry, 1, Direction::Right, base + ATTACK_COOLDOWN);
        assert!(matches!(late, Some(AttackOutcome::Resolved { .. })));
        assert_eq!(
            registry.find(2).unwrap().health,
            MAX_HEALTH - 2 * ATTACK_DAMAGE
        );
    }

    #[test]
    fn health_floors_at_zero() {
        let mut registry = registry_with(&["Ann", "Bo"]);
        place(&mut registry, 1, 100.0, 100.0);
        place(&mut registry, 2, 150.0, 100.0);
        registry.find_mut(2).unwrap().health = 5;

        attempt_attack(&mut registry, 1, Direction::Right, Instant::now()).unwrap();
        assert_eq!(registry.find(2).unwrap().health, 0);
    }

    #[test]
    fn zero_health_players_are_inert_targets() {
        let mut registry = registry_with(&["Ann", "Bo"]);
        place(&mut registry, 1, 100.0, 100.0);
        place(&mut registry, 2, 150.0, 100.0);
        registry.find_mut(2).unwrap().health = 0;

        match attempt_attack(&mut registry, 1, Direction::Right, Instant::now()) {
            Some(AttackOutcome::Resolved { hits }) => assert!(hits.is_empty()),
            other => panic!("expected resolved attack, got {:?}", other),
        }
        assert_eq!(registry.find(2).unwrap().health, 0);
        // The dead player is still registered, just inert.
        assert!(registry.find(2).is_some());
    }

    #[test]
    fn attacker_never_hits_itself() {
        let mut registry = registry_with(&["Ann"]);
        place(&mut registry, 1, 100.0, 100.0);

        match attempt_attack(&mut registry, 1, Direction::None, Instant::now()) {
            Some(AttackOutcome::Resolved { hits }) => assert!(hits.is_empty()),
            other => panic!("expected resolved attack, got {:?}", other),
        }
        assert_eq!(registry.find(1).unwrap().health, MAX_HEALTH);
    }

    #[test]
    fn one_swing_can_hit_multiple_defenders() {
        let mut registry = registry_with(&["Ann", "Bo", "Cy"]);
        place(&mut registry, 1, 100.0, 100.0);
        place(&mut registry, 2, 150.0, 100.0);
        place(&mut registry, 3, 190.0, 140.0);

        match attempt_attack(&mut registry, 1, Direction::Right, Instant::now()) {
            Some(AttackOutcome::Resolved { mut hits }) => {
                hits.sort();
                assert_eq!(hits, vec![2, 3]);
            }
            other => panic!("expected resolved attack, got {:?}", other),
        }
        assert_eq!(registry.find(2).unwrap().health, MAX_HEALTH - ATTACK_DAMAGE);
        assert_eq!(registry.find(3).unwrap().health, MAX_HEALTH - ATTACK_DAMAGE);
        assert_eq!(registry.chat.len(), 2);
    }

    #[test]
    fn none_direction_falls_back_to_facing() {
        let mut registry = registry_with(&["Ann", "Bo"]);
        place(&mut registry, 1, 100.0, 100.0);
        place(&mut registry, 2, 150.0, 100.0);
        registry.find_mut(1).unwrap().direction = Direction::Right;

        match attempt_attack(&mut registry, 1, Direction::None, Instant::now()) {
            Some(AttackOutcome::Resolved { hits }) => assert_eq!(hits, vec![2]),
            other => panic!("expected resolved attack, got {:?}", other),
        }
    }

    #[test]
    fn missing_attacker_is_a_silent_no_op() {
        let mut registry = registry_with(&["Ann"]);
        assert!(attempt_attack(&mut registry, 99, Direction::Left, Instant::now()).is_none());
    }
}
