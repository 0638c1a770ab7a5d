//! Tile map loading and wall lookup.
//!
//! A map file is a grid of single-digit tiles, `0` for open floor and any
//! other digit for stone. Everything that isn't a digit (newlines, spaces)
//! is skipped. The first row of the file is the top of the map; world `y`
//! grows upward, so rows are stored flipped.

use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_MAP_SIZE: usize = 50;

/// Offsets of the eight neighbours of a tile, in the bit order used by
/// [`TileMap::open_neighbors`]: the four sides first, then the corners.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wall {
    #[default]
    None,
    Stone,
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map file: {0}")]
    Io(#[from] std::io::Error),

    #[error("map has {found} tiles, expected {expected}")]
    TooShort { expected: usize, found: usize },
}

#[derive(Debug, Clone)]
pub struct TileMap {
    width: usize,
    height: usize,
    walls: Vec<Wall>,
}

impl TileMap {
    /// An open map with no walls.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            walls: vec![Wall::None; width * height],
        }
    }

    /// Bordered arena with a stone pillar every fourth tile.
    pub fn arena(width: usize, height: usize) -> Self {
        let mut map = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
                let pillar = x % 4 == 0 && y % 4 == 0;
                if border || pillar {
                    map.set_wall(x as i32, y as i32, Wall::Stone);
                }
            }
        }
        map
    }

    pub fn parse(text: &str, width: usize, height: usize) -> Result<Self, MapError> {
        let expected = width * height;
        let tiles: Vec<Wall> = text
            .chars()
            .filter_map(|c| c.to_digit(10))
            .take(expected)
            .map(|d| if d == 0 { Wall::None } else { Wall::Stone })
            .collect();

        if tiles.len() < expected {
            return Err(MapError::TooShort {
                expected,
                found: tiles.len(),
            });
        }

        let mut map = Self::new(width, height);
        for (row, line) in tiles.chunks(width).enumerate() {
            let y = height - 1 - row;
            for (x, &wall) in line.iter().enumerate() {
                map.set_wall(x as i32, y as i32, wall);
            }
        }
        Ok(map)
    }

    pub fn load<P: AsRef<Path>>(path: P, width: usize, height: usize) -> Result<Self, MapError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, width, height)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(x as usize + y as usize * self.width)
    }

    /// Everything outside the map counts as stone.
    pub fn wall_at(&self, x: i32, y: i32) -> Wall {
        self.index(x, y)
            .map_or(Wall::Stone, |i| self.walls[i])
    }

    pub fn is_open(&self, x: i32, y: i32) -> bool {
        self.wall_at(x, y) == Wall::None
    }

    /// Out-of-bounds writes are ignored.
    pub fn set_wall(&mut self, x: i32, y: i32, wall: Wall) {
        if let Some(i) = self.index(x, y) {
            self.walls[i] = wall;
        }
    }

    /// Coordinates of every stone tile.
    pub fn stone_tiles(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.walls
            .iter()
            .enumerate()
            .filter(|(_, wall)| **wall == Wall::Stone)
            .map(move |(i, _)| ((i % self.width) as i32, (i / self.width) as i32))
    }

    /// Bit `i` is set when the tile at `NEIGHBOR_OFFSETS[i]` is open floor.
    pub fn open_neighbors(&self, x: i32, y: i32) -> u8 {
        NEIGHBOR_OFFSETS
            .iter()
            .enumerate()
            .filter(|(_, (dx, dy))| self.is_open(x + dx, y + dy))
            .fold(0, |mask, (bit, _)| mask | 1 << bit)
    }

    /// Whether tile `(x, y)` can be seen from `eye`.
    ///
    /// Walks every tile the segment from `eye` to the center of `(x, y)`
    /// passes through and fails on the first stone one. Neither the tile
    /// holding `eye` nor the target itself can block, so wall faces are
    /// always visible from the floor in front of them.
    pub fn line_of_sight(&self, eye: [f32; 2], x: i32, y: i32) -> bool {
        // Tile (i, j) covers [i - 0.5, i + 0.5), so shift by half a tile
        // and the containing tile is just floor().
        let start = [eye[0] + 0.5, eye[1] + 0.5];
        let delta = [x as f32 + 0.5 - start[0], y as f32 + 0.5 - start[1]];
        let mut cell = (start[0].floor() as i32, start[1].floor() as i32);

        let (step_x, mut next_x, advance_x) = axis_crossings(start[0], delta[0]);
        let (step_y, mut next_y, advance_y) = axis_crossings(start[1], delta[1]);

        while cell != (x, y) {
            // Once an axis lines up with the target it never moves again,
            // which keeps rounding from overshooting.
            let along_x = if cell.0 == x {
                false
            } else if cell.1 == y {
                true
            } else {
                next_x <= next_y
            };

            if along_x {
                cell.0 += step_x;
                next_x += advance_x;
            } else {
                cell.1 += step_y;
                next_y += advance_y;
            }

            if cell != (x, y) && !self.is_open(cell.0, cell.1) {
                return false;
            }
        }
        true
    }
}

/// Step direction, segment parameter of the first tile boundary, and the
/// parameter distance between boundaries along one axis.
fn axis_crossings(start: f32, delta: f32) -> (i32, f32, f32) {
    if delta > 0.0 {
        (1, (start.floor() + 1.0 - start) / delta, 1.0 / delta)
    } else if delta < 0.0 {
        (-1, (start - start.floor()) / -delta, -1.0 / delta)
    } else {
        (0, f32::INFINITY, f32::INFINITY)
    }
}
