//! Keyboard sampling for movement

use macroquad::prelude::*;

/// 1/√2, so diagonal movement is as fast as straight movement.
const DIAGONAL_SCALE: f32 = 0.707_106_77;

/// Turns held movement keys into a direction vector. `up` is +y.
///
/// Opposing keys cancel out.
pub fn direction(up: bool, down: bool, left: bool, right: bool) -> [f32; 2] {
    let mut dir = [0.0f32, 0.0];
    if left {
        dir[0] -= 1.0;
    }
    if right {
        dir[0] += 1.0;
    }
    if up {
        dir[1] += 1.0;
    }
    if down {
        dir[1] -= 1.0;
    }

    if dir[0] != 0.0 && dir[1] != 0.0 {
        dir[0] *= DIAGONAL_SCALE;
        dir[1] *= DIAGONAL_SCALE;
    }
    dir
}

/// Samples WASD and the arrow keys for this frame.
pub fn read_direction() -> [f32; 2] {
    direction(
        is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
        is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
        is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
        is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
    )
}
