use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lightshafts_wgpu::LightShaftsSettings;

#[derive(Parser)]
#[command(name = "lsfx", about = "Volumetric light shafts post-process driver", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the filter command sequence for a set of settings (no GPU needed)
    Plan {
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Render a procedural scene headlessly, apply light shafts and save a PNG
    Render {
        /// Output PNG path
        #[arg(short, long, default_value = "light_shafts.png")]
        output: PathBuf,
        /// Output width in pixels
        #[arg(long, default_value_t = 960)]
        width: u32,
        /// Output height in pixels
        #[arg(long, default_value_t = 540)]
        height: u32,
        /// Sun forward direction as x,y,z (the way the light travels)
        #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true, default_value = "0.2,-0.15,-1")]
        sun: [f32; 3],
        /// Render the scene without the effect as well, next to the output
        #[arg(long)]
        keep_original: bool,
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

/// Settings file plus per-field overrides; overrides win.
#[derive(Args)]
pub struct SettingsArgs {
    /// JSON settings file; missing fields take their defaults
    #[arg(long)]
    pub settings: Option<PathBuf>,
    #[arg(long)]
    pub blur_samples: Option<u32>,
    #[arg(long, allow_hyphen_values = true)]
    pub blur_distance: Option<f32>,
    #[arg(long)]
    pub intensity: Option<f32>,
    #[arg(long)]
    pub alignment_falloff: Option<f32>,
    #[arg(long)]
    pub alignment_lower_edge: Option<f32>,
    #[arg(long)]
    pub alignment_upper_edge: Option<f32>,
    #[arg(long)]
    pub jitter_factor: Option<f32>,
    #[arg(long)]
    pub downsamples: Option<u32>,
    /// Reduced-precision working buffers
    #[arg(long)]
    pub lower_precision: bool,
    #[arg(long)]
    pub fixed_length: bool,
    /// Five extra Kawase blur iterations
    #[arg(long)]
    pub extra_blur: bool,
}

impl SettingsArgs {
    pub fn resolve(&self) -> anyhow::Result<LightShaftsSettings> {
        let mut s = match &self.settings {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
                serde_json::from_str(&text).map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?
            }
            None => LightShaftsSettings::default(),
        };

        macro_rules! apply {
            ($($field:ident => $target:ident),* $(,)?) => {
                $(if let Some(v) = self.$field { s.$target = v; })*
            };
        }
        apply!(
            blur_samples => blur_samples,
            blur_distance => blur_distance,
            intensity => intensity,
            alignment_falloff => alignment_falloff,
            alignment_lower_edge => alignment_lower_edge,
            alignment_upper_edge => alignment_upper_edge,
            jitter_factor => jitter_factor,
            downsamples => downsamples,
        );
        s.lower_texture_to_16bit |= self.lower_precision;
        s.use_fixed_length |= self.fixed_length;
        s.use_additional_blurring |= self.extra_blur;

        let clamped = s.clamped();
        if clamped != s {
            log::warn!("settings out of range were clamped");
        }
        Ok(clamped)
    }
}

fn parse_vec3(s: &str) -> Result<[f32; 3], String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(format!("expected x,y,z, got {} components", parts.len())),
    }
}
