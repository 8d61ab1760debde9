//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, deterministic (golden-testable):
//! - observed points: `o`
//! - model curve: `-`
//! - component curves: `.`

use crate::plot::PlotFrame;

/// Render `frame` into a `width` x `height` grid plus a one-line header.
pub fn render_ascii(frame: &PlotFrame, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) = frame.x_bounds().unwrap_or((0.0, 1.0));
    let (y_min, y_max) = frame.y_bounds().unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    let axes = Axes {
        x_min,
        x_max,
        y_min,
        y_max,
    };

    // Model first so it wins over components; points overwrite both.
    if let Some(model) = &frame.model {
        draw_curve(&mut grid, &frame.grid, model, &axes, '-');
    }
    for c in &frame.components {
        draw_curve(&mut grid, &frame.grid, &c.y, &axes, '.');
    }
    for (&x, &y) in frame.x.iter().zip(&frame.data) {
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][col] = 'o';
    }

    let mut out = format!("Plot: x=[{x_min:.3}, {x_max:.3}] | y=[{y_min:.2}, {y_max:.2}]\n");
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

struct Axes {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // Row 0 is the top.
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], xs: &[f64], ys: &[f64], axes: &Axes, ch: char) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for (&x, &y) in xs.iter().zip(ys) {
        if !(x.is_finite() && y.is_finite()) {
            prev = None;
            continue;
        }
        let col = map_x(x, axes.x_min, axes.x_max, width);
        let row = map_y(y, axes.y_min, axes.y_max, height);
        match prev {
            Some((c0, r0)) => draw_line(grid, c0, r0, col, row, ch),
            None if grid[row][col] == ' ' => grid[row][col] = ch,
            None => {}
        }
        prev = Some((col, row));
    }
}

/// Bresenham line; only fills blank cells.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if let Some(cell) = grid
            .get_mut(y0 as usize)
            .and_then(|row| row.get_mut(x0 as usize))
        {
            if *cell == ' ' {
                *cell = ch;
            }
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
