//! Platformer movement: input application and the per-tick physics step.
//!
//! The step runs once per tick for every player, whether or not that player
//! produced input this tick. Inputs only set velocities and flags; all
//! position changes happen here.

use crate::registry::Player;
use shared::{
    Action, Direction, Platform, ARENA_HEIGHT, ARENA_WIDTH, FRICTION, GRAVITY, JUMP_VELOCITY,
    MAX_FALL_SPEED, PLAYER_SIZE, PLAYER_SPEED, STOP_EPSILON,
};

// How close a player's bottom edge must sit to a surface to count as
// standing on it.
const SUPPORT_TOLERANCE: f32 = 0.1;

/// Applies one movement input to a player's velocity and flags.
///
/// The server owns the truth of the crouch flag: it is set by a `down` move
/// and cleared by a move in any other direction.
pub fn apply_input(player: &mut Player, action: Action, direction: Direction) {
    match action {
        Action::Move => {
            player.direction = direction;
            player.crouching = direction == Direction::Down;
            match direction {
                Direction::Left => player.vel_x = -PLAYER_SPEED,
                Direction::Right => player.vel_x = PLAYER_SPEED,
                Direction::Up => jump(player),
                Direction::Down | Direction::None => {}
            }
        }
        Action::Stop => player.vel_x = 0.0,
        Action::Attack | Action::None => {}
    }
}

/// Jump state machine. A grounded jump grants the double-jump; the airborne
/// second jump requires an active jump with the double-jump still available
/// and consumes it. Walking off a ledge (airborne, jumping=false) grants no
/// air jump.
fn jump(player: &mut Player) {
    if player.grounded {
        player.vel_y = JUMP_VELOCITY;
        player.grounded = false;
        player.jumping = true;
        player.double_jump = true;
    } else if player.jumping && player.double_jump {
        player.vel_y = JUMP_VELOCITY;
        player.double_jump = false;
    }
}

/// Rests the player exactly on a surface whose top edge is at `top`.
fn land(player: &mut Player, top: f32) {
    player.y = top - PLAYER_SIZE;
    player.vel_y = 0.0;
    player.grounded = true;
    player.jumping = false;
    player.double_jump = true;
}

/// Whether anything is directly under the player's feet.
fn supported(player: &Player, platforms: &[Platform]) -> bool {
    let bottom = player.y + PLAYER_SIZE;
    if bottom >= ARENA_HEIGHT - SUPPORT_TOLERANCE {
        return true;
    }
    platforms.iter().any(|platform| {
        (bottom - platform.top()).abs() <= SUPPORT_TOLERANCE
            && player.x + PLAYER_SIZE > platform.left()
            && player.x < platform.right()
    })
}

/// Advances one player by `dt` seconds: gravity, integration, friction,
/// platform resolution, floor fallback and bounds clamping.
pub fn step(player: &mut Player, platforms: &[Platform], dt: f32) {
    // A grounded player with nothing left beneath it starts falling.
    if player.grounded && !supported(player, platforms) {
        player.grounded = false;
    }

    if !player.grounded {
        player.vel_y = (player.vel_y + GRAVITY * dt).min(MAX_FALL_SPEED);
    }

    let prev_x = player.x;
    let prev_bottom = player.y + PLAYER_SIZE;

    player.x += player.vel_x * dt;
    player.y += player.vel_y * dt;

    // Horizontal damping, snapped to zero below the threshold so velocity
    // never creeps forever.
    player.vel_x *= FRICTION;
    if player.vel_x.abs() < STOP_EPSILON {
        player.vel_x = 0.0;
    }

    // Landing and side blocking are independent checks per platform: a
    // player can be blocked by one platform while landing on another in the
    // same tick.
    for platform in platforms {
        let h_overlap =
            player.x + PLAYER_SIZE > platform.left() && player.x < platform.right();

        // Landing: the bottom edge crossed the platform top while falling.
        if player.vel_y > 0.0
            && prev_bottom <= platform.top()
            && player.y + PLAYER_SIZE >= platform.top()
            && h_overlap
        {
            land(player, platform.top());
        }

        // Side blocking: vertical extents overlap and the player moved into
        // the platform this tick.
        let v_overlap =
            player.y + PLAYER_SIZE > platform.top() && player.y < platform.bottom();
        if v_overlap {
            if player.vel_x > 0.0
                && prev_x + PLAYER_SIZE <= platform.left()
                && player.x + PLAYER_SIZE > platform.left()
            {
                player.x = platform.left() - PLAYER_SIZE;
                player.vel_x = 0.0;
            } else if player.vel_x < 0.0
                && prev_x >= platform.right()
                && player.x < platform.right()
            {
                player.x = platform.right();
                player.vel_x = 0.0;
            }
        }
    }

    // Arena-floor fallback: nobody falls through the world.
    if player.y + PLAYER_SIZE >= ARENA_HEIGHT {
        land(player, ARENA_HEIGHT);
    }

    player.x = player.x.clamp(0.0, ARENA_WIDTH - PLAYER_SIZE);
    player.y = player.y.clamp(0.0, ARENA_HEIGHT - PLAYER_SIZE);
}
