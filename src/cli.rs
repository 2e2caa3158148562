// ============================================================================
// Luma CLI: headless batch processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   luma -i photo.jpg --preset warm.luma -o out.png
//   luma -i shots/*.jpg --preset bw.luma --output-dir processed/
//   luma -i scan.png --rotate cw --crop 10,10,800,600 -o fixed.png
//
// Each input goes through the same steps a user would take: load, run the
// destructive transforms, apply the preset, render, write. The output format
// is inferred from the output extension.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::error::{LumaError, LumaResult};
use crate::ops::transform::{DestructiveTransform, FlipAxis, Rotation};
use crate::preset::Preset;
use crate::project::Session;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Luma headless photo processor.
///
/// Apply saved edit presets and simple geometry fixes to image files.
#[derive(Parser, Debug)]
#[command(
    name = "luma",
    about = "Luma headless batch photo processor",
    long_about = "Apply .luma edit presets, rotations, flips and crops to image files\n\
                  without opening an editor. Reads and writes PNG, JPEG, WEBP, BMP,\n\
                  TGA, ICO and TIFF.\n\n\
                  Example:\n  \
                  luma --input photo.jpg --preset warm.luma --output result.png\n  \
                  luma -i *.jpg --preset bw.luma --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Preset document to apply after the geometry steps.
    #[arg(short, long, value_name = "PRESET.luma")]
    pub preset: Option<PathBuf>,

    /// Rotate 90°: cw or ccw.
    #[arg(long, value_name = "cw|ccw")]
    pub rotate: Option<RotateArg>,

    /// Mirror the image: h or v.
    #[arg(long, value_name = "h|v")]
    pub flip: Option<FlipArg>,

    /// Crop rectangle in pixels, applied after rotate/flip.
    #[arg(long, value_name = "X,Y,W,H")]
    pub crop: Option<CropArg>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing. Files keep their stem and
    /// extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Engine tunables (JSON). Missing fields use defaults.
    #[arg(long, value_name = "CONFIG.json")]
    pub config: Option<PathBuf>,

    /// Mirror log output to stderr and print per-file timing.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RotateArg(pub Rotation);

impl FromStr for RotateArg {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cw" | "90" => Ok(Self(Rotation::Clockwise)),
            "ccw" | "-90" | "270" => Ok(Self(Rotation::CounterClockwise)),
            other => Err(format!("unknown rotation '{other}' (expected cw or ccw)")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlipArg(pub FlipAxis);

impl FromStr for FlipArg {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "h" | "horizontal" => Ok(Self(FlipAxis::Horizontal)),
            "v" | "vertical" => Ok(Self(FlipAxis::Vertical)),
            other => Err(format!("unknown flip axis '{other}' (expected h or v)")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropArg {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FromStr for CropArg {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("bad crop '{s}': {e}"))?;
        match parts.as_slice() {
            &[x, y, width, height] if width > 0 && height > 0 => Ok(Self { x, y, width, height }),
            _ => Err(format!("bad crop '{s}' (expected X,Y,W,H with W,H > 0)")),
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let config = match &args.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("error: could not read config '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };

    // Parse once; validation against each image happens per file.
    let preset = match &args.preset {
        Some(path) => match Preset::load(path) {
            Ok(p) => Some(p),
            Err(e) => {
                eprintln!("error: could not read preset '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let steps = geometry_steps(&args);
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &steps, preset.as_ref(), &config) {
            Ok(()) => {
                info!(input = %input_path.display(), output = %output_path.display(), "processed");
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                error!(input = %input_path.display(), error = %e, "processing failed");
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

/// Rotate, then flip, then crop.
fn geometry_steps(args: &CliArgs) -> Vec<DestructiveTransform> {
    let mut steps = Vec::new();
    if let Some(RotateArg(r)) = args.rotate {
        steps.push(DestructiveTransform::Rotate(r));
    }
    if let Some(FlipArg(axis)) = args.flip {
        steps.push(DestructiveTransform::Flip(axis));
    }
    if let Some(c) = args.crop {
        steps.push(DestructiveTransform::Crop { x: c.x, y: c.y, width: c.width, height: c.height });
    }
    steps
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

/// Load, transform, apply the preset, render, save.
pub fn run_one(
    input: &Path,
    output: &Path,
    steps: &[DestructiveTransform],
    preset: Option<&Preset>,
    config: &EngineConfig,
) -> LumaResult<()> {
    let mut session = Session::new(config.clone());
    session.open(input)?;

    for step in steps {
        session.apply_transform(*step);
    }

    if let Some(preset) = preset {
        session.apply_preset(preset)?;
    }

    let frame = session.frame().ok_or(LumaError::NoImage)?;
    save_frame(frame, output)
}

/// Write the frame; formats without alpha get the RGB channels only.
fn save_frame(frame: &image::RgbaImage, output: &Path) -> LumaResult<()> {
    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" | "bmp" => {
            image::DynamicImage::ImageRgba8(frame.clone()).to_rgb8().save(output)?;
        }
        "" => {
            warn!(output = %output.display(), "no extension, writing PNG");
            frame.save_with_format(output, image::ImageFormat::Png)?;
        }
        _ => frame.save(output)?,
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, keeps the input file name)
/// 3. Fallback: next to the input with an `_edited` suffix on the stem
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let file_name = input.file_name()?;
    if let Some(dir) = output_dir {
        return Some(dir.join(file_name));
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let ext = input.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_else(|| "png".into());
    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{stem}_edited.{ext}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_geometry_flags() {
        let args = CliArgs::try_parse_from([
            "luma", "-i", "a.jpg", "--rotate", "ccw", "--flip", "h", "--crop", "1,2,30,40",
        ])
        .unwrap();
        assert_eq!(
            geometry_steps(&args),
            vec![
                DestructiveTransform::Rotate(Rotation::CounterClockwise),
                DestructiveTransform::Flip(FlipAxis::Horizontal),
                DestructiveTransform::Crop { x: 1, y: 2, width: 30, height: 40 },
            ]
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(CliArgs::try_parse_from(["luma", "-i", "a.jpg", "--rotate", "sideways"]).is_err());
        assert!(CliArgs::try_parse_from(["luma", "-i", "a.jpg", "--crop", "1,2,3"]).is_err());
        assert!(CliArgs::try_parse_from(["luma", "-i", "a.jpg", "--crop", "1,2,0,3"]).is_err());
        assert!(CliArgs::try_parse_from(["luma"]).is_err());
    }

    #[test]
    fn output_path_priority() {
        let input = Path::new("shots/cat.jpg");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), Some(Path::new("out"))),
            Some(PathBuf::from("x.png"))
        );
        assert_eq!(build_output_path(input, None, Some(Path::new("out"))), Some(PathBuf::from("out/cat.jpg")));
        assert_eq!(build_output_path(input, None, None), Some(PathBuf::from("shots/cat_edited.jpg")));
    }
}
