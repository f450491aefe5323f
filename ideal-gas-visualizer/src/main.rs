use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use clap::Parser;
use dashmap::DashMap;
use env_logger::Builder;
use ideal_gas_common::snapshot::{read_bincode_header, read_bincode_snapshot};
use ideal_gas_common::{SimulationConfig, Snapshot, SpeedHistogram};
use image::{ImageBuffer, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn, LevelFilter};
use minimp4::Mp4Muxer;
use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate};
use openh264::formats::YUVBuffer;
use palette::{FromColor, Hsv, Srgb};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufReader, Cursor};
use std::path::PathBuf;
use std::time::Instant;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input snapshot file path (.bin); the run must use output format = "bincode"
    #[arg(short, long)]
    input: PathBuf,

    /// Output video file path (.mp4)
    #[arg(short, long, default_value = "ideal_gas.mp4")]
    output: PathBuf,

    /// Width of the output video in pixels
    #[arg(long, default_value_t = 1100)]
    width: u32,

    /// Height of the output video in pixels
    #[arg(long, default_value_t = 700)]
    height: u32,

    /// Frames per second for the output video
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Optional path to the config.toml file to get exact container dimensions
    #[arg(long)]
    config: Option<PathBuf>,

    /// Container width (used if config is not provided)
    #[arg(long, default_value_t = 600.0)]
    container_width: f32,

    /// Container height (used if config is not provided)
    #[arg(long, default_value_t = 600.0)]
    container_height: f32,

    /// Background color - name of the color for the background
    #[arg(long, default_value = "darkgreen")]
    bg_color: String,

    /// TrueType font used for labels; frames are drawn without text if omitted
    #[arg(long)]
    font: Option<PathBuf>,

    /// Chunk size for parallel processing
    #[arg(long, default_value_t = 10)]
    chunk_size: usize,
}

// Color definitions for named colors (RGBA format)
const COLOR_MAP: &[(&str, [u8; 4])] = &[
    ("black", [0, 0, 0, 255]),
    ("white", [255, 255, 255, 255]),
    ("red", [255, 0, 0, 255]),
    ("green", [0, 255, 0, 255]),
    ("blue", [0, 0, 255, 255]),
    ("yellow", [255, 255, 0, 255]),
    ("cyan", [0, 255, 255, 255]),
    ("magenta", [255, 0, 255, 255]),
    ("orange", [255, 165, 0, 255]),
    ("purple", [128, 0, 128, 255]),
    ("teal", [0, 128, 128, 255]),
    ("gray", [128, 128, 128, 255]),
    ("silver", [192, 192, 192, 255]),
    ("maroon", [128, 0, 0, 255]),
    ("darkgreen", [0, 100, 0, 255]),
];

const MARGIN_PX: i32 = 10;
/// Share of the frame width given to the container view; histograms use the rest.
const CONTAINER_VIEW_FRACTION: f32 = 0.62;
const HISTOGRAM_BACKGROUND: [u8; 4] = [128, 0, 0, 255];

/// A rendered frame tagged with its position in the video.
struct Frame {
    index: usize,
    image: RgbaImage,
}

/// Pixel placement of the container view and the histogram panel within a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Layout {
    width: u32,
    height: u32,
    pixels_per_unit: f32,
    /// Top-left pixel of the container rectangle.
    container_origin: (i32, i32),
    container_size_px: (u32, u32),
    panel_x: i32,
    panel_width: u32,
}

impl Layout {
    fn new(width: u32, height: u32, container_width: f32, container_height: f32) -> Self {
        let view_width = (width as f32 * CONTAINER_VIEW_FRACTION) as i32;
        let avail_w = (view_width - 2 * MARGIN_PX).max(1) as f32;
        let avail_h = (height as i32 - 2 * MARGIN_PX).max(1) as f32;
        // Use smaller scale to ensure everything fits
        let pixels_per_unit = (avail_w / container_width).min(avail_h / container_height);

        let container_size_px = (
            ((container_width * pixels_per_unit).round() as u32).max(1),
            ((container_height * pixels_per_unit).round() as u32).max(1),
        );
        let container_origin = (MARGIN_PX, (height as i32 - container_size_px.1 as i32) / 2);

        let panel_x = view_width + MARGIN_PX;
        let panel_width = (width as i32 - panel_x - MARGIN_PX).max(1) as u32;

        Self { width, height, pixels_per_unit, container_origin, container_size_px, panel_x, panel_width }
    }

    /// Converts simulation coordinates to pixels. Y is flipped: the container origin is bottom-left.
    fn to_pixel(&self, x: f32, y: f32) -> (i32, i32) {
        let px = self.container_origin.0 as f32 + x * self.pixels_per_unit;
        let py = self.container_origin.1 as f32 + self.container_size_px.1 as f32 - y * self.pixels_per_unit;
        (px.round() as i32, py.round() as i32)
    }
}

/// Parse a color name to RGBA values
fn parse_color(color_name: &str) -> Option<[u8; 4]> {
    COLOR_MAP
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(color_name))
        .map(|&(_, color)| color)
}

/// Maps a particle color tag to RGBA. Unknown tags get a stable hue derived from the name.
fn color_for_tag(tag: &str) -> [u8; 4] {
    if let Some(color) = parse_color(tag) {
        return color;
    }
    // FNV-1a, so a tag keeps its color across runs.
    let hash = tag
        .bytes()
        .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
    let hue = (hash % 360) as f32;
    let rgb = Srgb::from_color(Hsv::new(hue, 0.7, 0.9));
    [
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
        255,
    ]
}

/// Black or white, whichever reads better on `background`.
fn text_color_for(background: [u8; 4]) -> Rgba<u8> {
    let luminance = 0.299 * background[0] as f32 + 0.587 * background[1] as f32 + 0.114 * background[2] as f32;
    if luminance > 128.0 {
        Rgba([0, 0, 0, 255])
    } else {
        Rgba([255, 255, 255, 255])
    }
}

fn rect(x: i32, y: i32, w: u32, h: u32) -> Rect {
    Rect::at(x, y).of_size(w.max(1), h.max(1))
}

/// Draws one species' speed histogram into the panel slot `(x, y, w, h)`.
fn draw_histogram(
    image: &mut RgbaImage,
    histogram: &SpeedHistogram,
    bounds: (i32, i32, u32, u32),
    font: Option<&FontVec>,
) {
    let (x, y, w, h) = bounds;
    let label_height: u32 = if font.is_some() { 18 } else { 0 };
    let graph_y = y + label_height as i32;
    let graph_h = h.saturating_sub(label_height).max(1);

    draw_filled_rect_mut(image, rect(x, graph_y, w, graph_h), Rgba(HISTOGRAM_BACKGROUND));

    let bins = histogram.frequencies.len().max(1);
    let max_freq = histogram.frequencies.iter().copied().max().unwrap_or(0);
    let bar_width = (w as f32 / bins as f32).max(1.0);
    let bar_color = Rgba(color_for_tag(&histogram.color));
    if max_freq > 0 {
        for (bin, &freq) in histogram.frequencies.iter().enumerate() {
            let bar_h = ((freq as f32 / max_freq as f32) * graph_h as f32).round() as u32;
            if bar_h == 0 {
                continue;
            }
            let bar_x = x + (bin as f32 * bar_width).round() as i32;
            let bar_y = graph_y + (graph_h - bar_h) as i32;
            draw_filled_rect_mut(image, rect(bar_x, bar_y, bar_width.floor() as u32, bar_h), bar_color);
        }
    }
    draw_hollow_rect_mut(image, rect(x, graph_y, w, graph_h), Rgba([255, 255, 255, 255]));

    if let Some(font) = font {
        let top_speed = histogram.bin_range * bins as f64;
        let label = format!(
            "{} speeds 0 .. {:.2} (max count {})",
            histogram.color, top_speed, max_freq
        );
        draw_text_mut(image, Rgba([255, 255, 255, 255]), x, y, PxScale::from(15.0), font, &label);
    }
}

/// Draw a snapshot frame
fn draw_frame(
    snapshot: &Snapshot,
    frame_index: usize,
    layout: &Layout,
    bg_color: [u8; 4],
    font: Option<&FontVec>,
) -> Frame {
    let mut image = ImageBuffer::from_pixel(layout.width, layout.height, Rgba(bg_color));

    let (cx, cy) = layout.container_origin;
    let (cw, ch) = layout.container_size_px;
    draw_filled_rect_mut(&mut image, rect(cx, cy, cw, ch), Rgba([0, 0, 0, 255]));
    draw_hollow_rect_mut(&mut image, rect(cx, cy, cw, ch), Rgba([255, 255, 255, 255]));

    if let Some(particles) = &snapshot.particles {
        for particle in particles {
            let (px, py) = layout.to_pixel(particle.x, particle.y);
            let radius_px = ((particle.radius * layout.pixels_per_unit).round() as i32).max(1);
            draw_filled_circle_mut(&mut image, (px, py), radius_px, Rgba(color_for_tag(&particle.color)));
        }
    }

    let histograms = &snapshot.speed_histograms;
    if !histograms.is_empty() {
        let count = histograms.len() as i32;
        let slot_h = ((layout.height as i32 - MARGIN_PX * (count + 1)) / count).max(1) as u32;
        for (i, histogram) in histograms.iter().enumerate() {
            let slot_y = MARGIN_PX + i as i32 * (slot_h as i32 + MARGIN_PX);
            draw_histogram(&mut image, histogram, (layout.panel_x, slot_y, layout.panel_width, slot_h), font);
        }
    }

    if let Some(font) = font {
        let status = format!(
            "Step {} | t = {:.2} | Particles: {} | Energy: {:.3}",
            snapshot.step, snapshot.time, snapshot.total_particle_count, snapshot.total_kinetic_energy
        );
        let text_y = (cy - 22).max(0);
        draw_text_mut(&mut image, text_color_for(bg_color), cx, text_y, PxScale::from(18.0), font, &status);
    }

    Frame { index: frame_index, image }
}

/// Process a chunk of snapshots in parallel
fn process_snapshot_chunk(
    chunk_data: &[Snapshot],
    start_index: usize,
    layout: &Layout,
    bg_color: [u8; 4],
    font: Option<&FontVec>,
) -> Vec<Frame> {
    chunk_data
        .par_iter()
        .enumerate()
        .map(|(i, snapshot)| draw_frame(snapshot, start_index + i, layout, bg_color, font))
        .collect()
}

/// RGB to YUV conversion for video encoding
fn rgb_to_yuv420(image: &RgbaImage) -> Vec<u8> {
    let width = image.width() as usize;
    let height = image.height() as usize;

    // I420: full-size Y plane, then quarter-size U and V planes.
    let y_plane_size = width * height;
    let uv_width = width / 2;
    let uv_height = height / 2;
    let mut yuv = vec![0u8; y_plane_size + 2 * uv_width * uv_height];

    for (x, y, pixel) in image.enumerate_pixels() {
        let (r, g, b) = (pixel[0] as f32, pixel[1] as f32, pixel[2] as f32);
        // RGB to Y conversion (BT.601 formula)
        yuv[y as usize * width + x as usize] = (0.299 * r + 0.587 * g + 0.114 * b).round() as u8;
    }

    let u_plane_offset = y_plane_size;
    let v_plane_offset = y_plane_size + uv_width * uv_height;

    // Chroma is averaged over each 2x2 block.
    for uv_y in 0..uv_height {
        for uv_x in 0..uv_width {
            let mut sum_u = 0f32;
            let mut sum_v = 0f32;
            for dy in 0..2 {
                for dx in 0..2 {
                    let pixel = image.get_pixel((uv_x * 2 + dx) as u32, (uv_y * 2 + dy) as u32);
                    let (r, g, b) = (pixel[0] as f32, pixel[1] as f32, pixel[2] as f32);
                    // RGB to UV conversion (BT.601 formula)
                    sum_u += -0.169 * r - 0.331 * g + 0.5 * b + 128.0;
                    sum_v += 0.5 * r - 0.419 * g - 0.081 * b + 128.0;
                }
            }
            yuv[u_plane_offset + uv_y * uv_width + uv_x] = (sum_u / 4.0).round().clamp(0.0, 255.0) as u8;
            yuv[v_plane_offset + uv_y * uv_width + uv_x] = (sum_v / 4.0).round().clamp(0.0, 255.0) as u8;
        }
    }

    yuv
}

fn progress_bar(len: u64, template: &str) -> Result<ProgressBar> {
    let bar = ProgressBar::new(len);
    bar.set_style(ProgressStyle::default_bar().template(template)?.progress_chars("#>-"));
    Ok(bar)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    Builder::from_default_env().filter(None, LevelFilter::Info).init();

    run_with_args(args)
}

fn run_with_args(args: Args) -> Result<()> {
    info!("Starting Ideal Gas Visualizer...");
    info!("Input file: {}", args.input.display());
    info!("Output video: {}", args.output.display());

    // --- Determine Container Dimensions ---
    let (container_width, container_height) = match &args.config {
        Some(config_path) => match SimulationConfig::load(config_path) {
            Ok(config) => {
                info!("Loaded container dimensions from {}", config_path.display());
                (config.container.width, config.container.height)
            }
            Err(e) => {
                warn!(
                    "Failed to load config file '{}': {}. Using provided dimensions.",
                    config_path.display(),
                    e
                );
                (args.container_width, args.container_height)
            }
        },
        None => {
            info!("Using provided container dimensions.");
            (args.container_width, args.container_height)
        }
    };
    info!("Container size: {:.1} x {:.1}", container_width, container_height);

    // YUV 4:2:0 needs even dimensions.
    let width = args.width & !1;
    let height = args.height & !1;
    if width < 2 || height < 2 {
        anyhow::bail!("Video dimensions {}x{} are too small.", args.width, args.height);
    }
    let layout = Layout::new(width, height, container_width, container_height);
    info!("Video dimensions: {}x{} px at {} fps", width, height, args.fps);
    info!("Scale: {:.4} pixels per unit", layout.pixels_per_unit);

    let bg_color = parse_color(&args.bg_color).unwrap_or_else(|| {
        warn!("Color '{}' not recognized, using black.", args.bg_color);
        [0, 0, 0, 255]
    });

    let font = match &args.font {
        Some(path) => {
            let bytes = fs::read(path).with_context(|| format!("Failed to read font file: {}", path.display()))?;
            let font = FontVec::try_from_vec(bytes)
                .map_err(|e| anyhow::anyhow!("Invalid font file '{}': {}", path.display(), e))?;
            Some(font)
        }
        None => {
            info!("No font given; frames will be drawn without labels.");
            None
        }
    };

    // --- Open and Parse Snapshot File ---
    let input_file = File::open(&args.input)
        .with_context(|| format!("Failed to open input file: {}", args.input.display()))?;
    let mut reader = BufReader::new(input_file);

    let snapshot_count = read_bincode_header(&mut reader).with_context(|| {
        format!(
            "'{}' is not a bincode snapshot stream; record the run with format = \"bincode\"",
            args.input.display()
        )
    })?;
    info!("Found {} snapshots in the file", snapshot_count);
    if snapshot_count == 0 {
        warn!("Input file contains no snapshots. Exiting.");
        return Ok(());
    }

    let chunk_size = args.chunk_size.max(1);
    let mut snapshot_chunks: Vec<Vec<Snapshot>> = Vec::new();
    let mut chunk = Vec::with_capacity(chunk_size);
    let mut snapshots_with_particles = 0;
    let mut read_count = 0usize;
    for i in 0..snapshot_count as usize {
        match read_bincode_snapshot(&mut reader) {
            Ok(snapshot) => {
                if snapshot.particles.as_ref().is_some_and(|p| !p.is_empty()) {
                    snapshots_with_particles += 1;
                }
                chunk.push(snapshot);
                read_count += 1;
                if chunk.len() >= chunk_size {
                    snapshot_chunks.push(std::mem::replace(&mut chunk, Vec::with_capacity(chunk_size)));
                }
            }
            Err(e) => {
                error!("Error deserializing snapshot {}: {:#}", i, e);
                break;
            }
        }
    }
    if !chunk.is_empty() {
        snapshot_chunks.push(chunk);
    }
    if read_count == 0 {
        anyhow::bail!(
            "No snapshot in '{}' could be decoded; record the run with format = \"bincode\"",
            args.input.display()
        );
    }

    if snapshots_with_particles == 0 {
        warn!("No snapshots contain particle states; only histograms will be drawn.");
        warn!("Set save_particles_in_snapshot = true in the run config to record them.");
    } else {
        info!("Found {} snapshots with particle states out of {}", snapshots_with_particles, read_count);
    }

    // --- Render Frames ---
    let start_time = Instant::now();
    let render_progress = progress_bar(
        read_count as u64,
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) [{eta}]",
    )?;

    let frames_map: DashMap<usize, RgbaImage> = DashMap::new();
    snapshot_chunks.par_iter().enumerate().for_each(|(chunk_idx, chunk_data)| {
        let frames = process_snapshot_chunk(chunk_data, chunk_idx * chunk_size, &layout, bg_color, font.as_ref());
        for frame in frames {
            frames_map.insert(frame.index, frame.image);
        }
        render_progress.inc(chunk_data.len() as u64);
    });
    render_progress.finish_with_message("Rendered frames");

    // --- Encode Frames ---
    info!("Encoding frames in sequence...");
    let mut encoder = Encoder::with_api_config(
        openh264::OpenH264API::from_source(),
        EncoderConfig::new()
            .max_frame_rate(FrameRate::from_hz(args.fps as f32))
            .bitrate(BitRate::from_bps(5_000_000)), // 5 Mbps
    )
    .context("Failed to initialize H.264 encoder")?;

    let encode_progress = progress_bar(
        frames_map.len() as u64,
        "[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} encoded ({percent}%) [{eta}]",
    )?;

    let mut sorted_keys: Vec<usize> = frames_map.iter().map(|entry| *entry.key()).collect();
    sorted_keys.sort_unstable();

    const ENCODE_BATCH_SIZE: usize = 30;
    let mut h264_data = Vec::new();
    let mut frame_count = 0usize;

    // Convert each batch to YUV in parallel, then encode sequentially to keep frame order
    for batch in sorted_keys.chunks(ENCODE_BATCH_SIZE) {
        let yuv_frames: Vec<(usize, Vec<u8>)> = batch
            .par_iter()
            .filter_map(|&key| frames_map.remove(&key).map(|(_, image)| (key, rgb_to_yuv420(&image))))
            .collect();

        for (key, yuv_data) in yuv_frames {
            let yuv_source = YUVBuffer::from_vec(yuv_data, width as usize, height as usize);
            match encoder.encode(&yuv_source) {
                Ok(bitstream) => {
                    bitstream.write_vec(&mut h264_data);
                    frame_count += 1;
                }
                Err(e) => error!("Error encoding frame {}: {}", key, e),
            }
            encode_progress.inc(1);
        }
    }
    encode_progress.finish_with_message(format!("Encoded {} frames successfully", frame_count));

    // --- Mux MP4 ---
    info!("Creating MP4 file...");
    let mut video_buffer = Cursor::new(Vec::new());
    {
        let mut mp4muxer = Mp4Muxer::new(&mut video_buffer);
        let video_description = format!("Ideal gas simulation - {} snapshots", read_count);
        mp4muxer.init_video(width as i32, height as i32, false, &video_description);
        mp4muxer.write_video(&h264_data);
        mp4muxer.close();
    }

    fs::write(&args.output, video_buffer.into_inner())
        .with_context(|| format!("Failed to write video file to {}", args.output.display()))?;

    let duration = start_time.elapsed();
    info!(
        "Video generation completed in {:.2?} ({:.1} frames per second)",
        duration,
        frame_count as f64 / duration.as_secs_f64()
    );
    info!("Output saved to: {}", args.output.display());

    Ok(())
}
