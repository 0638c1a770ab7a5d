use crate::game::ClientGameState;
use crate::map::{TileMap, NEIGHBOR_OFFSETS};
use macroquad::prelude::*;

/// Clear color, which is also what floor in shadow looks like.
const SHADOW: Color = Color::new(0.12, 0.12, 0.12, 1.0);
const FLOOR_LIT: Color = Color::new(0.7, 0.7, 0.7, 1.0);
const WALL_BASE: Color = Color::new(0.18, 0.18, 0.18, 1.0);
const WALL_EDGE: Color = Color::new(0.3, 0.3, 0.3, 1.0);

/// Width of the lighter band on a wall side that faces open floor, in tiles.
const EDGE_BAND: f32 = 0.2;

/// Converts a wire color to a macroquad one.
pub fn to_color(rgb: [f32; 3]) -> Color {
    Color::new(rgb[0], rgb[1], rgb[2], 1.0)
}

/// Maps a world point to screen pixels for a camera centered on `center`.
///
/// World `y` points up, screen `y` points down.
pub fn world_to_screen(
    point: [f32; 2],
    center: [f32; 2],
    screen: [f32; 2],
    tile_size: f32,
) -> Vec2 {
    vec2(
        screen[0] / 2.0 + (point[0] - center[0]) * tile_size,
        screen[1] / 2.0 - (point[1] - center[1]) * tile_size,
    )
}

/// Inclusive range of tile coordinates along one axis that can show up in a
/// window `extent` pixels wide around `center`, clipped to `0..len`.
fn tiles_on_screen(center: f32, extent: f32, tile_size: f32, len: usize) -> (i32, i32) {
    let half = extent / 2.0 / tile_size + 1.0;
    let low = ((center - half).floor() as i32).max(0);
    let high = ((center + half).ceil() as i32).min(len as i32 - 1);
    (low, high)
}

/// World-space rectangle, relative to a wall tile's center, of the band
/// along the side or corner facing `offset`. Returns `(min, max)`.
fn edge_band(offset: (i32, i32)) -> ([f32; 2], [f32; 2]) {
    let span = |d: i32| match d {
        d if d < 0 => (-0.5, -0.5 + EDGE_BAND),
        d if d > 0 => (0.5 - EDGE_BAND, 0.5),
        _ => (-0.5, 0.5),
    };
    let (x0, x1) = span(offset.0);
    let (y0, y1) = span(offset.1);
    ([x0, y0], [x1, y1])
}

pub struct Renderer {
    tile_size: f32,
}

impl Renderer {
    pub fn new(tile_size: f32) -> Self {
        Self {
            tile_size: tile_size.max(1.0),
        }
    }

    pub fn render(&self, map: &TileMap, game: &ClientGameState) {
        clear_background(SHADOW);

        let screen = [screen_width(), screen_height()];
        let center = game.player.position;

        self.draw_floor(map, center, screen);
        self.draw_walls(map, center, screen);

        for player in game.players() {
            self.draw_square(player.position, center, screen, to_color(player.color));
        }

        // Where this client thinks it is, which may run ahead of the snapshot.
        let origin = self.tile_origin(center, center, screen);
        draw_rectangle_lines(
            origin.x,
            origin.y,
            self.tile_size,
            self.tile_size,
            2.0,
            WHITE,
        );

        self.draw_hud(game);
    }

    /// Top-left pixel of the tile-sized square centered on `position`.
    fn tile_origin(&self, position: [f32; 2], center: [f32; 2], screen: [f32; 2]) -> Vec2 {
        world_to_screen(
            [position[0] - 0.5, position[1] + 0.5],
            center,
            screen,
            self.tile_size,
        )
    }

    /// Lights the open tiles the local player can see. Everything else keeps
    /// the shadow clear color.
    fn draw_floor(&self, map: &TileMap, center: [f32; 2], screen: [f32; 2]) {
        let (x_low, x_high) = tiles_on_screen(center[0], screen[0], self.tile_size, map.width());
        let (y_low, y_high) = tiles_on_screen(center[1], screen[1], self.tile_size, map.height());

        for y in y_low..=y_high {
            for x in x_low..=x_high {
                if map.is_open(x, y) && map.line_of_sight(center, x, y) {
                    self.draw_square([x as f32, y as f32], center, screen, FLOOR_LIT);
                }
            }
        }
    }

    fn draw_walls(&self, map: &TileMap, center: [f32; 2], screen: [f32; 2]) {
        for (x, y) in map.stone_tiles() {
            let origin = self.tile_origin([x as f32, y as f32], center, screen);
            let off_screen = origin.x + self.tile_size < 0.0
                || origin.y + self.tile_size < 0.0
                || origin.x > screen[0]
                || origin.y > screen[1];
            if off_screen {
                continue;
            }

            draw_rectangle(origin.x, origin.y, self.tile_size, self.tile_size, WALL_BASE);

            let open = map.open_neighbors(x, y);
            for (bit, &offset) in NEIGHBOR_OFFSETS.iter().enumerate() {
                if open & (1 << bit) == 0 {
                    continue;
                }
                let (min, max) = edge_band(offset);
                // Screen y is flipped, so the top-left corner is (min x, max y).
                let top_left = world_to_screen(
                    [x as f32 + min[0], y as f32 + max[1]],
                    center,
                    screen,
                    self.tile_size,
                );
                draw_rectangle(
                    top_left.x,
                    top_left.y,
                    (max[0] - min[0]) * self.tile_size,
                    (max[1] - min[1]) * self.tile_size,
                    WALL_EDGE,
                );
            }
        }
    }

    fn draw_square(&self, position: [f32; 2], center: [f32; 2], screen: [f32; 2], color: Color) {
        let origin = self.tile_origin(position, center, screen);
        draw_rectangle(origin.x, origin.y, self.tile_size, self.tile_size, color);
    }

    fn draw_hud(&self, game: &ClientGameState) {
        let text = format!(
            "{} players  speed {:.2}",
            game.players().len(),
            game.player.speed
        );
        draw_text(&text, 10.0, 20.0, 20.0, WHITE);

        if game.snapshots_received() == 0 {
            draw_text("Waiting for server...", 10.0, 44.0, 20.0, YELLOW);
        }
    }
}
