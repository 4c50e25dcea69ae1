use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ParallelProgressIterator, ProgressStyle};
use log::{info, warn};
use palette::{FromColor, Hsv, Srgb};
use plotters::prelude::*;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;
use swarm_common::{ArenaLayout, RunRecord, Snapshot};

/// Frames beyond this count are downscaled by skipping snapshots.
const MAX_FRAMES: usize = 200;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run record written by swarm-engine (.json, .bin or .msgpack)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the rendered images
    #[arg(short, long, default_value = "render")]
    output: PathBuf,

    /// Width of each image in pixels; height follows the arena aspect ratio
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Render individual frames in addition to the trajectory overview
    #[arg(long, default_value_t = false)]
    frames: bool,

    /// Render every frame instead of downscaling to at most 200
    #[arg(long, default_value_t = false)]
    no_downscale: bool,
}

fn load_record(path: &Path) -> Result<RunRecord> {
    let file = File::open(path).with_context(|| format!("Failed to open '{}'", path.display()))?;
    let reader = BufReader::new(file);
    let record = match path.extension().and_then(|e| e.to_str()) {
        Some("bin") => bincode::deserialize_from(reader)?,
        Some("msgpack") => rmp_serde::decode::from_read(reader)?,
        Some("json") => serde_json::from_reader(reader)?,
        other => anyhow::bail!("Unrecognised record extension {:?}", other),
    };
    Ok(record)
}

/// One evenly spread colour per group.
fn group_palette(count: usize) -> Vec<RGBColor> {
    (0..count.max(1))
        .map(|i| {
            let hue = 360.0 * i as f32 / count.max(1) as f32;
            let rgb = Srgb::from_color(Hsv::new(hue, 0.75, 0.85));
            RGBColor((rgb.red * 255.0) as u8, (rgb.green * 255.0) as u8, (rgb.blue * 255.0) as u8)
        })
        .collect()
}

fn image_size(layout: &ArenaLayout, width: u32) -> (u32, u32) {
    let aspect = (layout.y_max - layout.y_min) / (layout.x_max - layout.x_min);
    (width, ((width as f64 * aspect).round() as u32).max(1))
}

fn agent_radius_px(layout: &ArenaLayout, width: u32) -> i32 {
    let px_per_unit = width as f64 / (layout.x_max - layout.x_min);
    ((layout.agent_radius * px_per_unit).round() as i32).max(1)
}

/// Group tags present in the run, ascending.
fn group_tags(layout: &ArenaLayout) -> Vec<u32> {
    let mut tags = layout.groups.clone();
    tags.sort_unstable();
    tags.dedup();
    tags
}

/// Center-of-mass trace of every group, keyed by group tag.
/// `centers_of_mass[k]` belongs to the k-th smallest tag present.
fn center_traces(record: &RunRecord) -> Vec<(u32, Vec<(f64, f64)>)> {
    group_tags(&record.layout)
        .into_iter()
        .enumerate()
        .map(|(k, tag)| {
            let trace = record.snapshots.iter().filter_map(|s| s.centers_of_mass.get(k).copied()).collect();
            (tag, trace)
        })
        .collect()
}

fn draw_scene(
    path: &Path,
    record: &RunRecord,
    width: u32,
    caption: &str,
    draw: impl FnOnce(
        &mut ChartContext<'_, BitMapBackend<'_>, Cartesian2d<plotters::coord::types::RangedCoordf64, plotters::coord::types::RangedCoordf64>>,
    ) -> Result<()>,
) -> Result<()> {
    let layout = &record.layout;
    let root = BitMapBackend::new(path, image_size(layout, width)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| anyhow::anyhow!("{:?}", e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(layout.x_min..layout.x_max, layout.y_min..layout.y_max)
        .map_err(|e| anyhow::anyhow!("{:?}", e))?;
    chart
        .configure_mesh()
        .x_desc("X coordinate")
        .y_desc("Y coordinate")
        .draw()
        .map_err(|e| anyhow::anyhow!("{:?}", e))?;

    chart
        .draw_series(layout.obstacles.iter().map(|o| {
            let style = if o.is_wall { BLACK.stroke_width(3) } else { RED.stroke_width(2) };
            Rectangle::new([(o.x_min, o.y_min), (o.x_max, o.y_max)], style)
        }))
        .map_err(|e| anyhow::anyhow!("{:?}", e))?;

    draw(&mut chart)?;
    root.present().map_err(|e| anyhow::anyhow!("{:?}", e))?;
    Ok(())
}

/// Full agent paths, one center trace per group and the target trace.
fn render_overview(record: &RunRecord, out_dir: &Path, width: u32) -> Result<PathBuf> {
    let path = out_dir.join("trajectories.png");
    let groups = &record.layout.groups;
    let n_groups = groups.iter().copied().max().map_or(1, |g| g as usize + 1);
    let colors = group_palette(n_groups);
    let radius = agent_radius_px(&record.layout, width);

    draw_scene(&path, record, width, "Agent trajectories", |chart| {
        for (i, &group) in groups.iter().enumerate() {
            let color = colors[group as usize % colors.len()];
            let trace = record.snapshots.iter().filter_map(|s| s.positions.get(i).copied());
            chart
                .draw_series(LineSeries::new(trace, color.mix(0.5)))
                .map_err(|e| anyhow::anyhow!("{:?}", e))?;
        }

        for (tag, trace) in center_traces(record) {
            let color = colors[tag as usize % colors.len()];
            chart
                .draw_series(LineSeries::new(trace, color.stroke_width(3)))
                .map_err(|e| anyhow::anyhow!("{:?}", e))?;
        }
        let targets = record.snapshots.iter().filter_map(|s| s.target);
        chart
            .draw_series(LineSeries::new(targets, MAGENTA.stroke_width(1)))
            .map_err(|e| anyhow::anyhow!("{:?}", e))?;

        if let Some(last) = record.snapshots.last() {
            chart
                .draw_series(last.positions.iter().enumerate().map(|(i, &p)| {
                    let group = groups.get(i).copied().unwrap_or(0) as usize;
                    Circle::new(p, radius, colors[group % colors.len()].filled())
                }))
                .map_err(|e| anyhow::anyhow!("{:?}", e))?;
        }
        Ok(())
    })?;
    Ok(path)
}

fn render_frame(record: &RunRecord, snapshot: &Snapshot, path: &Path, width: u32, colors: &[RGBColor]) -> Result<()> {
    let radius = agent_radius_px(&record.layout, width);
    let caption = format!("t = {:.2} s | agents: {}", snapshot.time, snapshot.positions.len());
    draw_scene(path, record, width, &caption, |chart| {
        chart
            .draw_series(snapshot.positions.iter().enumerate().map(|(i, &p)| {
                let group = record.layout.groups.get(i).copied().unwrap_or(0) as usize;
                Circle::new(p, radius, colors[group % colors.len()].mix(0.6).filled())
            }))
            .map_err(|e| anyhow::anyhow!("{:?}", e))?;
        let tags = group_tags(&record.layout);
        chart
            .draw_series(snapshot.centers_of_mass.iter().zip(&tags).map(|(&c, &tag)| {
                Circle::new(c, 2 * radius, colors[tag as usize % colors.len()].stroke_width(2))
            }))
            .map_err(|e| anyhow::anyhow!("{:?}", e))?;
        if let Some(target) = snapshot.target {
            chart
                .draw_series(std::iter::once(Cross::new(target, radius.max(4), MAGENTA.stroke_width(2))))
                .map_err(|e| anyhow::anyhow!("{:?}", e))?;
        }
        Ok(())
    })
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let record = load_record(&args.input)?;
    info!(
        "Loaded {} snapshots of {} agents from {}.",
        record.snapshots.len(),
        record.layout.groups.len(),
        args.input.display()
    );
    if record.snapshots.is_empty() {
        warn!("Record holds no snapshots, nothing to render.");
        return Ok(());
    }
    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory '{}'", args.output.display()))?;

    let overview = render_overview(&record, &args.output, args.width)?;
    info!("Trajectory overview written to {}", overview.display());

    if args.frames {
        let stride = if args.no_downscale || record.snapshots.len() <= MAX_FRAMES {
            1
        } else {
            record.snapshots.len() / MAX_FRAMES
        };
        let selected: Vec<&Snapshot> = record.snapshots.iter().step_by(stride).collect();
        let n_groups = record.layout.groups.iter().copied().max().map_or(1, |g| g as usize + 1);
        let colors = group_palette(n_groups);
        let style = ProgressStyle::with_template("{bar:40} {pos}/{len} frames ({eta})")
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        let start = Instant::now();
        selected
            .par_iter()
            .enumerate()
            .progress_with_style(style)
            .try_for_each(|(i, snapshot)| {
                let path = args.output.join(format!("frame_{:05}.png", i));
                render_frame(&record, snapshot, &path, args.width, &colors)
            })?;
        info!(
            "Rendered {} frames (every {} snapshot(s)) in {:.2} s.",
            selected.len(),
            stride,
            start.elapsed().as_secs_f64()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_common::ObstacleBox;

    fn record() -> RunRecord {
        let snapshot = |tick: u32| Snapshot {
            tick,
            time: tick as f64 * 0.01,
            positions: vec![(1.0, 1.0), (2.0, 1.0), (1.0 + tick as f64, 3.0)],
            centers_of_mass: vec![(1.0 + tick as f64 / 2.0, 2.0), (2.0, 1.0)],
            target: (tick > 0).then_some((4.0, 4.0)),
        };
        RunRecord {
            dt: 0.01,
            layout: ArenaLayout {
                x_min: 0.0,
                y_min: 0.0,
                x_max: 8.0,
                y_max: 4.0,
                agent_radius: 0.1,
                groups: vec![2, 5, 2],
                obstacles: vec![ObstacleBox { is_wall: false, x_min: 5.0, y_min: 1.0, x_max: 6.0, y_max: 2.0 }],
            },
            snapshots: (0..3).map(snapshot).collect(),
        }
    }

    #[test]
    fn image_height_follows_arena_aspect() {
        let layout = record().layout;
        assert_eq!(image_size(&layout, 800), (800, 400));
        assert_eq!(agent_radius_px(&layout, 800), 10);
    }

    #[test]
    fn palette_gives_each_group_its_own_colour() {
        let colors = group_palette(4);
        assert_eq!(colors.len(), 4);
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(group_palette(0).len(), 1);
    }

    #[test]
    fn every_group_gets_a_center_trace() {
        let traces = center_traces(&record());
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].0, 2);
        assert_eq!(traces[0].1, vec![(1.0, 2.0), (1.5, 2.0), (2.0, 2.0)]);
        assert_eq!(traces[1].0, 5);
        assert_eq!(traces[1].1.len(), 3);
    }

    #[test]
    fn records_load_back_from_every_format() {
        let dir = std::env::temp_dir().join(format!("swarm-visualizer-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let original = record();

        let json = dir.join("run.json");
        serde_json::to_writer(File::create(&json).unwrap(), &original).unwrap();
        let bin = dir.join("run.bin");
        bincode::serialize_into(File::create(&bin).unwrap(), &original).unwrap();
        let msgpack = dir.join("run.msgpack");
        rmp_serde::encode::write(&mut File::create(&msgpack).unwrap(), &original).unwrap();

        for path in [&json, &bin, &msgpack] {
            let loaded = load_record(path).unwrap();
            assert_eq!(loaded.snapshots.len(), 3);
            assert_eq!(loaded.layout.groups, vec![2, 5, 2]);
            assert_eq!(loaded.snapshots[0].target, None);
            assert_eq!(loaded.snapshots[2].positions[2], (3.0, 3.0));
        }
        assert!(load_record(&dir.join("run.txt")).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }
}
