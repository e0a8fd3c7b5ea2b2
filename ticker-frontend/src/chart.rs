//! Chart geometry: scales, gridlines, axes, line paths, end markers, and
//! the pointer-driven crosshair. Every frame is rebuilt from the current
//! store and selection, so the renderer has no state to go stale.

use std::collections::HashMap;

use ticker_core::{SeriesStore, Timestamp};

use crate::surface::{DrawSurface, LabelAlign, Segment};
use crate::view::{format_clock, ViewMode};

/// Fixed gridline counts: vertical (time) and horizontal (value).
pub const TIME_GRID_TICKS: usize = 10;
pub const VALUE_GRID_TICKS: usize = 5;

const BACKGROUND: &str = "#0c111a";
const GRID_COLOR: &str = "#1b2836";
const LABEL_COLOR: &str = "#d5e0ef";
const CROSSHAIR_COLOR: &str = "#8ab4ff";
const DEFAULT_SERIES_COLOR: &str = "#1f77b4";
const LINE_WIDTH: f64 = 2.0;
const MARKER_RADIUS: f64 = 3.0;

#[derive(Debug, Clone, Copy)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margins {
    fn default() -> Self {
        // Wide right margin leaves room for the value axis.
        Self {
            top: 30.0,
            right: 100.0,
            bottom: 30.0,
            left: 20.0,
        }
    }
}

pub struct Chart {
    width: f64,
    height: f64,
    margin: Margins,
    colors: HashMap<String, String>,
    mode: ViewMode,
    x_domain: (Timestamp, Timestamp),
    y_domain: (f64, f64),
    pointer: Option<(f64, f64)>,
    dirty: bool,
}

impl Chart {
    pub fn new(width: f64, height: f64, margin: Margins) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
            margin,
            colors: HashMap::new(),
            mode: ViewMode::Hidden,
            x_domain: (0, 1),
            y_domain: (0.0, 1.0),
            pointer: None,
            dirty: true,
        }
    }

    pub fn set_colors<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.colors = pairs.into_iter().collect();
    }

    pub fn mode(&self) -> &ViewMode {
        &self.mode
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        if self.mode != mode {
            self.mode = mode;
            self.dirty = true;
        }
    }

    pub fn mark_data_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn needs_render(&self) -> bool {
        self.dirty
    }

    pub fn set_pointer(&mut self, x: f64, y: f64) {
        self.pointer = Some((x, y));
        self.dirty = true;
    }

    pub fn clear_pointer(&mut self) {
        if self.pointer.take().is_some() {
            self.dirty = true;
        }
    }

    // --- layout ------------------------------------------------------------

    fn plot_left(&self) -> f64 {
        self.margin.left
    }

    fn plot_right(&self) -> f64 {
        self.width - self.margin.right
    }

    fn plot_top(&self) -> f64 {
        self.margin.top
    }

    fn plot_bottom(&self) -> f64 {
        self.height - self.margin.bottom
    }

    fn plot_width(&self) -> f64 {
        (self.plot_right() - self.plot_left()).max(1.0)
    }

    fn plot_height(&self) -> f64 {
        (self.plot_bottom() - self.plot_top()).max(1.0)
    }

    fn in_plot(&self, x: f64, y: f64) -> bool {
        x >= self.plot_left() && x <= self.plot_right() && y >= self.plot_top() && y <= self.plot_bottom()
    }

    // --- coordinate transforms ----------------------------------------------

    pub fn time_to_x(&self, ts: Timestamp) -> f64 {
        let (t0, t1) = self.x_domain;
        let span = (t1 - t0) as f64;
        if span <= 0.0 {
            return self.plot_left();
        }
        self.plot_left() + (ts - t0) as f64 / span * self.plot_width()
    }

    pub fn value_to_y(&self, v: f64) -> f64 {
        let (v0, v1) = self.y_domain;
        let range = (v1 - v0).max(1e-9);
        let norm = (v - v0) / range;
        self.plot_bottom() - norm * self.plot_height()
    }

    pub fn x_to_time(&self, x: f64) -> Timestamp {
        let (t0, t1) = self.x_domain;
        let span = (t1 - t0) as f64;
        if span <= 0.0 {
            return t0;
        }
        let ratio = ((x - self.plot_left()) / self.plot_width()).clamp(0.0, 1.0);
        t0 + (ratio * span) as i64
    }

    /// Refresh both scale domains from the store. False when nothing is
    /// drawable yet (no selected ticker has a sample).
    fn update_domains(&mut self, store: &SeriesStore) -> bool {
        let Some((t0, t1)) = self.mode.time_domain(store) else {
            return false;
        };
        let Some((v0, v1)) = self.mode.value_domain(store) else {
            return false;
        };
        self.x_domain = if t1 > t0 { (t0, t1) } else { (t0, t0 + 1) };
        let span = v1 - v0;
        let pad = if span > 0.0 {
            span * 0.035
        } else {
            v0.abs().max(1.0) * 0.035
        };
        self.y_domain = (v0 - pad, v1 + pad);
        true
    }

    fn time_ticks(&self) -> Vec<Timestamp> {
        let (t0, t1) = self.x_domain;
        let span = t1 - t0;
        if span <= 0 {
            return Vec::new();
        }
        let step = span / (TIME_GRID_TICKS as i64 + 1);
        (1..=TIME_GRID_TICKS as i64).map(|i| t0 + step * i).collect()
    }

    fn value_ticks(&self) -> Vec<f64> {
        let (v0, v1) = self.y_domain;
        let step = (v1 - v0) / (VALUE_GRID_TICKS as f64 - 1.0);
        (0..VALUE_GRID_TICKS).map(|i| v0 + step * i as f64).collect()
    }

    fn color_for(&self, ticker: &str) -> &str {
        self.colors
            .get(ticker)
            .map(String::as_str)
            .unwrap_or(DEFAULT_SERIES_COLOR)
    }

    // --- rendering ----------------------------------------------------------

    pub fn render(&mut self, surface: &mut dyn DrawSurface, store: &SeriesStore) {
        self.dirty = false;
        surface.begin_frame(self.width, self.height, BACKGROUND);
        if self.mode == ViewMode::Hidden {
            return;
        }
        if !self.update_domains(store) {
            return;
        }
        self.render_grid_and_axes(surface);
        self.render_series(surface, store);
        self.render_crosshair(surface, store);
    }

    fn render_grid_and_axes(&self, surface: &mut dyn DrawSurface) {
        let time_ticks = self.time_ticks();
        let value_ticks = self.value_ticks();

        let mut grid: Vec<Segment> = Vec::with_capacity(time_ticks.len() + value_ticks.len());
        for t in &time_ticks {
            let x = self.time_to_x(*t);
            grid.push((x, self.plot_top(), x, self.plot_bottom()));
        }
        for v in &value_ticks {
            let y = self.value_to_y(*v);
            grid.push((self.plot_left(), y, self.plot_right(), y));
        }
        surface.draw_segments(&grid, GRID_COLOR, 1.0);

        // Time axis runs along both the top and the bottom edge.
        for t in &time_ticks {
            let x = self.time_to_x(*t);
            let label = format_clock(*t);
            surface.draw_label(&label, x, self.plot_top() - 8.0, LABEL_COLOR, LabelAlign::Center);
            surface.draw_label(
                &label,
                x,
                self.plot_bottom() + 18.0,
                LABEL_COLOR,
                LabelAlign::Center,
            );
        }

        // Value axis on the right, formatted per mode.
        for v in &value_ticks {
            surface.draw_label(
                &self.mode.format_value(*v),
                self.plot_right() + 8.0,
                self.value_to_y(*v) + 4.0,
                LABEL_COLOR,
                LabelAlign::Left,
            );
        }
    }

    fn render_series(&self, surface: &mut dyn DrawSurface, store: &SeriesStore) {
        for ticker in self.mode.tickers() {
            let Some(series) = store.by_ticker(ticker) else {
                continue;
            };
            if series.is_empty() {
                continue;
            }
            let points: Vec<(f64, f64)> = series
                .as_slice()
                .iter()
                .map(|s| (self.time_to_x(s.ts), self.value_to_y(self.mode.value_of(s))))
                .collect();
            let color = self.color_for(ticker);
            surface.draw_polyline(&points, color, LINE_WIDTH);
            if let Some(&(x, y)) = points.last() {
                surface.draw_circle(x, y, MARKER_RADIUS, color);
            }
        }
    }

    fn render_crosshair(&self, surface: &mut dyn DrawSurface, store: &SeriesStore) {
        let Some((px, py)) = self.pointer else {
            return;
        };
        if !self.in_plot(px, py) {
            return;
        }
        let ts = self.x_to_time(px);
        surface.draw_segments(
            &[(px, self.plot_top(), px, self.plot_bottom())],
            CROSSHAIR_COLOR,
            1.0,
        );
        for ticker in self.mode.tickers() {
            let Some(series) = store.by_ticker(ticker) else {
                continue;
            };
            let Some(idx) = series.nearest(ts) else {
                continue;
            };
            let sample = series.as_slice()[idx];
            let value = self.mode.value_of(&sample);
            let x = self.time_to_x(sample.ts);
            let y = self.value_to_y(value);
            let color = self.color_for(ticker);
            surface.draw_circle(x, y, MARKER_RADIUS, color);
            surface.draw_label(
                &format!("{ticker} {}", self.mode.format_value(value)),
                x + 8.0,
                y - 8.0,
                color,
                LabelAlign::Left,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{SelectionSet, ViewMode};
    use ticker_core::{DayResetPolicy, PricedRow, MINUTE_MS};

    #[derive(Default)]
    struct Recorder {
        frames: usize,
        segment_batches: Vec<(usize, String)>,
        polylines: Vec<(Vec<(f64, f64)>, String)>,
        circles: Vec<(f64, f64, String)>,
        labels: Vec<String>,
    }

    impl DrawSurface for Recorder {
        fn begin_frame(&mut self, _width: f64, _height: f64, _clear_color: &str) {
            self.frames += 1;
        }

        fn draw_segments(&mut self, segments: &[Segment], color: &str, _width: f64) {
            self.segment_batches.push((segments.len(), color.to_string()));
        }

        fn draw_polyline(&mut self, points: &[(f64, f64)], color: &str, _width: f64) {
            self.polylines.push((points.to_vec(), color.to_string()));
        }

        fn draw_circle(&mut self, x: f64, y: f64, _radius: f64, color: &str) {
            self.circles.push((x, y, color.to_string()));
        }

        fn draw_label(&mut self, text: &str, _x: f64, _y: f64, _color: &str, _align: LabelAlign) {
            self.labels.push(text.to_string());
        }
    }

    fn store_with(rows: &[(i64, &str, f64)]) -> SeriesStore {
        let mut store = SeriesStore::new(["AAPL", "GOOGL", "FB", "MSFT"], DayResetPolicy::Clear);
        let rows: Vec<PricedRow> = rows
            .iter()
            .map(|(ts, t, p)| PricedRow {
                ts: *ts,
                ticker: t.to_string(),
                price: *p,
            })
            .collect();
        store.load(&rows);
        store
    }

    fn chart_with_mode(selection: &[&str]) -> Chart {
        let mut sel = SelectionSet::new();
        for t in selection {
            sel.set(t, true);
        }
        let mut chart = Chart::new(750.0, 600.0, Margins::default());
        chart.set_mode(ViewMode::from_selection(&sel));
        chart
    }

    #[test]
    fn hidden_mode_clears_and_draws_nothing() {
        let store = store_with(&[(0, "AAPL", 100.0)]);
        let mut chart = chart_with_mode(&[]);
        let mut rec = Recorder::default();
        chart.render(&mut rec, &store);
        assert_eq!(rec.frames, 1);
        assert!(rec.polylines.is_empty());
        assert!(rec.segment_batches.is_empty());
        assert!(rec.labels.is_empty());
    }

    #[test]
    fn waits_until_selected_ticker_has_samples() {
        let store = store_with(&[(0, "AAPL", 100.0)]);
        let mut chart = chart_with_mode(&["MSFT"]);
        let mut rec = Recorder::default();
        chart.render(&mut rec, &store);
        assert_eq!(rec.frames, 1);
        assert!(rec.polylines.is_empty());
        assert!(rec.segment_batches.is_empty());
    }

    #[test]
    fn single_mode_draws_line_marker_and_dollar_axis() {
        let store = store_with(&[
            (0, "AAPL", 100.0),
            (MINUTE_MS, "AAPL", 101.0),
            (2 * MINUTE_MS, "AAPL", 102.0),
        ]);
        let mut chart = chart_with_mode(&["AAPL"]);
        let mut rec = Recorder::default();
        chart.render(&mut rec, &store);

        assert_eq!(rec.polylines.len(), 1);
        assert_eq!(rec.polylines[0].0.len(), 3);
        // End marker sits on the last point of the path.
        let last = *rec.polylines[0].0.last().unwrap();
        assert_eq!(rec.circles.len(), 1);
        assert!((rec.circles[0].0 - last.0).abs() < 1e-9);
        assert!((rec.circles[0].1 - last.1).abs() < 1e-9);
        // One grid batch: 10 vertical + 5 horizontal lines.
        assert_eq!(rec.segment_batches.len(), 1);
        assert_eq!(rec.segment_batches[0].0, TIME_GRID_TICKS + VALUE_GRID_TICKS);
        // Value axis labels are currency in single mode; time labels appear
        // twice (top and bottom axes).
        assert!(rec.labels.iter().any(|l| l.starts_with('$')));
        assert!(!rec.labels.iter().any(|l| l.ends_with('%')));
        let time_labels = rec.labels.iter().filter(|l| l.contains(':')).count();
        assert_eq!(time_labels, TIME_GRID_TICKS * 2);
    }

    #[test]
    fn comparison_mode_skips_empty_series_and_formats_percent() {
        let store = store_with(&[
            (0, "AAPL", 100.0),
            (MINUTE_MS, "AAPL", 101.0),
            (0, "GOOGL", 2800.0),
            (MINUTE_MS, "GOOGL", 2807.0),
        ]);
        // FB has no samples: its line and marker are skipped, the rest draw.
        let mut chart = chart_with_mode(&["AAPL", "GOOGL", "FB"]);
        let mut rec = Recorder::default();
        chart.render(&mut rec, &store);

        assert_eq!(rec.polylines.len(), 2);
        assert_eq!(rec.circles.len(), 2);
        assert!(rec.labels.iter().any(|l| l.ends_with('%')));
        assert!(!rec.labels.iter().any(|l| l.starts_with('$')));
    }

    #[test]
    fn series_colors_follow_the_configured_palette() {
        let store = store_with(&[(0, "AAPL", 100.0), (MINUTE_MS, "AAPL", 101.0)]);
        let mut chart = chart_with_mode(&["AAPL"]);
        chart.set_colors([("AAPL".to_string(), "#9467bd".to_string())]);
        let mut rec = Recorder::default();
        chart.render(&mut rec, &store);
        assert_eq!(rec.polylines[0].1, "#9467bd");
        assert_eq!(rec.circles[0].2, "#9467bd");
    }

    #[test]
    fn pixel_mapping_round_trips_within_the_plot() {
        let store = store_with(&[
            (0, "AAPL", 100.0),
            (MINUTE_MS, "AAPL", 101.0),
            (2 * MINUTE_MS, "AAPL", 102.0),
        ]);
        let mut chart = chart_with_mode(&["AAPL"]);
        let mut rec = Recorder::default();
        chart.render(&mut rec, &store);

        for ts in [0, MINUTE_MS, 2 * MINUTE_MS] {
            let x = chart.time_to_x(ts);
            assert!((chart.x_to_time(x) - ts).abs() <= 1);
        }
        // Higher values map to smaller y (origin is top-left).
        assert!(chart.value_to_y(102.0) < chart.value_to_y(100.0));
    }

    #[test]
    fn crosshair_snaps_to_center_nearest_sample() {
        let store = store_with(&[
            (0, "AAPL", 100.0),
            (MINUTE_MS, "AAPL", 101.0),
            (2 * MINUTE_MS, "AAPL", 102.0),
        ]);
        let mut chart = chart_with_mode(&["AAPL"]);
        // First render establishes the scale domains.
        chart.render(&mut Recorder::default(), &store);

        // Pointer at the pixel midpoint between the last two samples: the
        // crosshair snaps to the earlier sample, never interpolates.
        let mid_x = (chart.time_to_x(MINUTE_MS) + chart.time_to_x(2 * MINUTE_MS)) / 2.0;
        chart.set_pointer(mid_x, 300.0);
        let mut rec = Recorder::default();
        chart.render(&mut rec, &store);

        let expected_x = chart.time_to_x(MINUTE_MS);
        assert!(
            rec.circles
                .iter()
                .any(|(x, _, _)| (x - expected_x).abs() < 1e-9),
            "no crosshair marker at the earlier sample"
        );
        assert!(rec.labels.iter().any(|l| l == "AAPL $101.00"));
        // Hairline batch on top of the grid batch.
        assert_eq!(rec.segment_batches.len(), 2);
        assert_eq!(rec.segment_batches[1].0, 1);
    }

    #[test]
    fn pointer_leave_hides_crosshair_artifacts() {
        let store = store_with(&[(0, "AAPL", 100.0), (MINUTE_MS, "AAPL", 101.0)]);
        let mut chart = chart_with_mode(&["AAPL"]);
        chart.render(&mut Recorder::default(), &store);
        chart.set_pointer(chart.time_to_x(0), 300.0);

        let mut rec = Recorder::default();
        chart.render(&mut rec, &store);
        chart.clear_pointer();
        assert!(chart.needs_render());

        let mut rec = Recorder::default();
        chart.render(&mut rec, &store);
        assert_eq!(rec.segment_batches.len(), 1); // grid only, no hairline
        assert_eq!(rec.circles.len(), 1); // end marker only
    }

    #[test]
    fn pointer_outside_plot_draws_no_crosshair() {
        let store = store_with(&[(0, "AAPL", 100.0), (MINUTE_MS, "AAPL", 101.0)]);
        let mut chart = chart_with_mode(&["AAPL"]);
        chart.set_pointer(5.0, 5.0);
        let mut rec = Recorder::default();
        chart.render(&mut rec, &store);
        assert_eq!(rec.segment_batches.len(), 1);
    }

    #[test]
    fn mode_switch_marks_chart_dirty() {
        let mut chart = chart_with_mode(&["AAPL"]);
        let store = store_with(&[(0, "AAPL", 100.0)]);
        let mut rec = Recorder::default();
        chart.render(&mut rec, &store);
        assert!(!chart.needs_render());

        let mut sel = SelectionSet::new();
        sel.set("AAPL", true);
        sel.set("MSFT", true);
        chart.set_mode(ViewMode::from_selection(&sel));
        assert!(chart.needs_render());

        // Setting the same mode again is not a change.
        let mut chart2 = chart_with_mode(&["AAPL"]);
        let mut rec2 = Recorder::default();
        chart2.render(&mut rec2, &store);
        let mut same = SelectionSet::new();
        same.set("AAPL", true);
        chart2.set_mode(ViewMode::from_selection(&same));
        assert!(!chart2.needs_render());
    }
}
