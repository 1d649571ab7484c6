//! Casino floor geometry.

pub const WORLD_WIDTH: f64 = 1_600.0;
pub const WORLD_HEIGHT: f64 = 1_200.0;

pub const SPAWN_X: f64 = WORLD_WIDTH / 2.0;
pub const SPAWN_Y: f64 = WORLD_HEIGHT / 2.0;

/// Avatars are kept this far from the outer walls.
pub const WALL_MARGIN: f64 = 70.0;

/// Distance between neighbouring machines, on the walls and in clusters.
pub const DEVICE_SPACING: f64 = 80.0;

const WALL_ROW_INSET: f64 = 120.0;
const WALL_ROW_START: f64 = 150.0;
const WALL_COLUMN_START: f64 = 200.0;

/// Free-standing device blocks as `(center_x, center_y, rows, cols)`.
const CLUSTERS: [(f64, f64, u32, u32); 6] = [
    (300.0, 300.0, 2, 3),
    (WORLD_WIDTH - 300.0, 300.0, 2, 3),
    (300.0, WORLD_HEIGHT - 300.0, 2, 3),
    (WORLD_WIDTH - 300.0, WORLD_HEIGHT - 300.0, 2, 3),
    (WORLD_WIDTH / 2.0 - 200.0, WORLD_HEIGHT / 2.0, 3, 2),
    (WORLD_WIDTH / 2.0 + 200.0, WORLD_HEIGHT / 2.0, 3, 2),
];

/// Clamp a position to the walkable area.
pub fn clamp_to_bounds(x: f64, y: f64) -> (f64, f64) {
    (
        x.clamp(WALL_MARGIN, WORLD_WIDTH - WALL_MARGIN),
        y.clamp(WALL_MARGIN, WORLD_HEIGHT - WALL_MARGIN),
    )
}

/// Device positions in id order: top wall, bottom wall, left wall, right
/// wall, then the interior clusters.
pub fn device_positions() -> Vec<(f64, f64)> {
    let mut positions = Vec::new();

    let mut x = WALL_ROW_START;
    while x < WORLD_WIDTH - WALL_ROW_START {
        positions.push((x, WALL_ROW_INSET));
        x += DEVICE_SPACING;
    }
    let mut x = WALL_ROW_START;
    while x < WORLD_WIDTH - WALL_ROW_START {
        positions.push((x, WORLD_HEIGHT - WALL_ROW_INSET));
        x += DEVICE_SPACING;
    }
    let mut y = WALL_COLUMN_START;
    while y < WORLD_HEIGHT - WALL_COLUMN_START {
        positions.push((WALL_ROW_INSET, y));
        y += DEVICE_SPACING;
    }
    let mut y = WALL_COLUMN_START;
    while y < WORLD_HEIGHT - WALL_COLUMN_START {
        positions.push((WORLD_WIDTH - WALL_ROW_INSET, y));
        y += DEVICE_SPACING;
    }

    for (center_x, center_y, rows, cols) in CLUSTERS {
        for row in 0..rows {
            for col in 0..cols {
                let dx = (col as f64 - (cols - 1) as f64 / 2.0) * DEVICE_SPACING;
                let dy = (row as f64 - (rows - 1) as f64 / 2.0) * DEVICE_SPACING;
                positions.push((center_x + dx, center_y + dy));
            }
        }
    }

    positions
}
